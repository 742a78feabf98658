//! voxtrain: download and train speech-to-text models as streamed background jobs
//!
//! Long-running work (fetching a model archive, training a model against its
//! sentence templates) runs off the request path. Its progress is streamed to
//! the client as `text/plain`, one line per event, and always ends with either
//! a success line or a single `ERROR: <message>` line.
//!
//! # Building Blocks
//!
//! - [`jobs`]: progress channel, job runner and per-model resource guard
//! - [`streaming`]: the chunked HTTP response over a progress channel
//! - [`download`] and [`training`]: the two job bodies
//! - [`handlers`]: the HTTP API
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use voxtrain::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = VoxtrainConfig::load_for_service("voxtrain")?;
//!     let address = config.server.bind_address();
//!     let state = AppState::with_config(config)?;
//!
//!     let listener = tokio::net::TcpListener::bind(address).await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod download;
pub mod error;
pub mod handlers;
pub mod health;
pub mod jobs;
pub mod models;
pub mod observability;
pub mod sentences;
pub mod state;
pub mod streaming;
pub mod training;
pub mod transcriber;

#[cfg(test)]
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use voxtrain::prelude::*;
    //! ```

    pub use crate::config::{BusyPolicy, VoxtrainConfig};
    pub use crate::download::{ArchiveSource, HttpArchiveSource};
    pub use crate::error::{VoxtrainError, VoxtrainResult};
    pub use crate::handlers::router;
    pub use crate::jobs::{
        Job, JobError, JobId, JobKind, JobResult, JobRunner, ProgressReceiver, ProgressSender,
        ResourceGuard, ResourceKey,
    };
    pub use crate::models::{ModelCatalog, ModelSpec};
    pub use crate::state::AppState;
    pub use crate::streaming::ProgressStream;
    pub use crate::training::{CommandTrainer, TrainRequest, Trainer};

    pub use axum;
}
