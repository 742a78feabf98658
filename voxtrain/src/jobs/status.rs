//! Job status tracking.

use super::{Job, JobId, JobKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a job known to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    /// Job body is executing.
    Running,

    /// Job finished successfully.
    Completed {
        /// When the job completed.
        completed_at: DateTime<Utc>,
    },

    /// Job returned an error or panicked.
    Failed {
        /// When the job failed.
        failed_at: DateTime<Utc>,
        /// Message shown to the client after `ERROR: `.
        error: String,
    },
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Get a human-readable status name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Point-in-time view of a job, as listed by `GET /api/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job ID.
    pub id: JobId,
    /// Kind of job.
    pub kind: JobKind,
    /// Model the job works on.
    pub model_id: String,
    /// When the runner started the job.
    pub started_at: DateTime<Utc>,
    /// Current status.
    pub status: JobStatus,
}

impl JobSnapshot {
    /// Snapshot of a job that just started.
    #[must_use]
    pub fn running(job: &Job) -> Self {
        Self {
            id: job.id,
            kind: job.kind(),
            model_id: job.key.id.clone(),
            started_at: Utc::now(),
            status: JobStatus::Running,
        }
    }
}
