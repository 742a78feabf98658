//! Error types and error handling

use crate::jobs::{error_line, GuardError};
use crate::streaming::CONTENT_TYPE;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that stop a request before any job output is produced
#[derive(Debug, Error)]
pub enum VoxtrainError {
    /// Bad request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Unknown model or missing resource (404)
    #[error("{0}")]
    NotFound(String),

    /// Resource busy (409)
    #[error(transparent)]
    Busy(#[from] GuardError),

    /// Filesystem error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl VoxtrainError {
    /// Unknown model id
    pub fn unknown_model(id: &str) -> Self {
        Self::NotFound(format!("Unknown model: {id}"))
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Yaml(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Busy(_) => StatusCode::CONFLICT,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A single `ERROR: <message>` line, the same shape a failed job ends with.
impl IntoResponse for VoxtrainError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let mut body = error_line(&self);
        body.push('\n');
        (status, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
    }
}

/// Result alias for request handlers
pub type VoxtrainResult<T> = Result<T, VoxtrainError>;
