//! Job error types.
//!
//! The `Display` form of a [`JobError`] is exactly what the client sees
//! after the `ERROR: ` prefix.

use thiserror::Error;

/// Result type for job bodies.
pub type JobResult<T> = Result<T, JobError>;

/// Failure reported by a job body.
#[derive(Debug, Error)]
pub enum JobError {
    /// Network or HTTP failure while fetching an archive.
    #[error("{0}")]
    Transport(String),

    /// Filesystem failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be unpacked.
    #[error("Failed to extract archive: {0}")]
    Archive(String),

    /// The external training program failed.
    #[error("{0}")]
    Training(String),

    /// Any other failure.
    #[error("{0}")]
    Failed(String),
}

impl JobError {
    /// Create a generic failure from a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
