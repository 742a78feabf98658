//! Background job execution with streamed progress.
//!
//! This module is the concurrency core of the service:
//! - [`ProgressSender`]/[`ProgressReceiver`]: ordered, unbounded hand-off of
//!   progress lines, terminated by an explicit [`ProgressItem::End`]
//! - [`JobRunner`]: runs a job body on its own worker and guarantees the
//!   channel is terminated exactly once, whether the body succeeds, fails or
//!   panics
//! - [`ResourceGuard`]: one mutating job per [`ResourceKey`], with cached
//!   handles invalidated before the job starts
//!
//! The HTTP side lives in [`crate::streaming`], which turns a receiver into a
//! chunked `text/plain` response.
//!
//! # Example
//!
//! ```rust
//! use voxtrain::jobs::{Job, JobRunner, ResourceGuard, ResourceKey};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let runner = JobRunner::default();
//! let guard: ResourceGuard<()> = ResourceGuard::new();
//!
//! let key = ResourceKey::train("en_US-rhasspy");
//! let scope = guard.begin_exclusive(key.clone()).await;
//! let progress = runner.spawn(Job::new(key), Some(scope), |progress| async move {
//!     progress.send("Compiling grammar");
//!     Ok(())
//! });
//!
//! let lines = progress.collect_lines().await;
//! assert_eq!(lines, ["Training started", "Compiling grammar", "Training complete"]);
//! # }
//! ```

mod channel;
mod error;
mod guard;
mod job;
mod observability;
mod runner;
mod status;

pub use channel::{progress_channel, ProgressItem, ProgressReceiver, ProgressSender};
pub use error::{JobError, JobResult};
pub use guard::{ExclusiveScope, GuardError, ResourceGuard};
pub use job::{Job, JobId, JobKind, ResourceKey};
pub use observability::JobExecutionContext;
pub use runner::{error_line, JobRunner, DEFAULT_HISTORY_LIMIT, ERROR_PREFIX};
pub use status::{JobSnapshot, JobStatus};
