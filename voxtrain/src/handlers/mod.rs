//! HTTP handlers and routing
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /api/download?id=` | [`jobs::download`] (streamed) |
//! | `POST /api/train?id=` | [`jobs::train`] (streamed) |
//! | `GET /api/jobs` | [`jobs::list_jobs`] |
//! | `GET /api/models` | [`models::list_models`] |
//! | `GET`/`POST /api/sentences?id=` | [`models::get_sentences`], [`models::save_sentences`] |
//! | `POST /api/transcriber?id=` | [`models::load_transcriber`] |
//! | `GET /health`, `GET /health/live` | [`crate::health`] |

pub mod jobs;
pub mod models;

use crate::health;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body (sentence files)
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// `?id=<model>` query string shared by the model endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ModelQuery {
    /// Model id
    pub id: String,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/download", post(jobs::download))
        .route("/api/train", post(jobs::train))
        .route("/api/jobs", get(jobs::list_jobs))
        .route("/api/models", get(models::list_models))
        .route(
            "/api/sentences",
            get(models::get_sentences).post(models::save_sentences),
        )
        .route("/api/transcriber", post(models::load_transcriber))
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
