//! Structured logging around job execution.

use super::{Job, JobId, ResourceKey};
use std::time::Instant;
use tracing::{error, info, warn};

/// Job execution context for logging and tracing.
#[derive(Debug, Clone)]
pub struct JobExecutionContext {
    /// Job ID.
    pub job_id: JobId,
    /// Resource the job mutates.
    pub key: ResourceKey,
    started: Instant,
}

impl JobExecutionContext {
    /// Create a context for `job`, starting the clock now.
    #[must_use]
    pub fn new(job: &Job) -> Self {
        Self {
            job_id: job.id,
            key: job.key.clone(),
            started: Instant::now(),
        }
    }

    /// Milliseconds since the context was created.
    #[must_use]
    pub fn execution_duration_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Log job start.
    pub fn log_start(&self) {
        info!(
            job_id = %self.job_id,
            key = %self.key,
            "Job execution started"
        );
    }

    /// Log job completion.
    pub fn log_completion(&self) {
        info!(
            job_id = %self.job_id,
            key = %self.key,
            duration_ms = self.execution_duration_ms(),
            "Job completed successfully"
        );
    }

    /// Log a job body that returned an error.
    pub fn log_failure(&self, error: &str) {
        error!(
            job_id = %self.job_id,
            key = %self.key,
            duration_ms = self.execution_duration_ms(),
            error = error,
            "Job execution failed"
        );
    }

    /// Log a job body that panicked.
    pub fn log_panic(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            key = %self.key,
            duration_ms = self.execution_duration_ms(),
            panic = message,
            "Job worker panicked"
        );
    }

    /// Log a worker that was torn down before it could report.
    pub fn log_aborted(&self) {
        warn!(
            job_id = %self.job_id,
            key = %self.key,
            duration_ms = self.execution_duration_ms(),
            "Job worker was cancelled by the runtime"
        );
    }
}
