//! Launches job bodies off the request path and always terminates their
//! progress channel.
//!
//! Each job gets two tasks: the worker, which runs the body, and a
//! supervisor, which awaits the worker's `JoinHandle`. Whatever the worker
//! does (succeeds, fails or panics), the supervisor appends one outcome
//! line, closes the channel exactly once, and only then releases the
//! job's [`ExclusiveScope`].

use super::{
    progress_channel, ExclusiveScope, Job, JobExecutionContext, JobId, JobResult, JobSnapshot,
    JobStatus, ProgressReceiver, ProgressSender,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Prefix of the line that reports a failed job.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Format a failure the way clients expect it: `ERROR: <message>`.
///
/// Multi-line messages are joined with spaces so the failure stays on one
/// line.
pub fn error_line(message: impl Display) -> String {
    let message = message.to_string();
    let mut line = String::from(ERROR_PREFIX);
    for (index, part) in message
        .lines()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .enumerate()
    {
        if index > 0 {
            line.push(' ');
        }
        line.push_str(part);
    }
    line
}

/// Default number of finished jobs remembered for `GET /api/jobs`.
pub const DEFAULT_HISTORY_LIMIT: usize = 32;

/// Runs job bodies on their own workers and tracks what is running.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct JobRunner {
    inner: Arc<RunnerInner>,
}

#[derive(Debug)]
struct RunnerInner {
    active: RwLock<HashMap<JobId, JobSnapshot>>,
    recent: Mutex<VecDeque<JobSnapshot>>,
    history_limit: usize,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl JobRunner {
    /// Create a runner that remembers up to `history_limit` finished jobs.
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                active: RwLock::new(HashMap::new()),
                recent: Mutex::new(VecDeque::with_capacity(history_limit)),
                history_limit,
            }),
        }
    }

    /// Run an async job body on a new task.
    ///
    /// Returns the live progress channel immediately. `scope`, if given, is
    /// held until the channel has been closed.
    pub fn spawn<F, Fut>(
        &self,
        job: Job,
        scope: Option<ExclusiveScope>,
        body: F,
    ) -> ProgressReceiver
    where
        F: FnOnce(ProgressSender) -> Fut + Send + 'static,
        Fut: Future<Output = JobResult<()>> + Send + 'static,
    {
        let (progress, receiver) = progress_channel();
        let context = self.start(&job, &progress);
        let emitter = progress.clone();
        let worker = tokio::spawn(async move { body(emitter).await });
        tokio::spawn(self.clone().supervise(job, context, progress, scope, worker));
        receiver
    }

    /// Run a blocking job body on the blocking thread pool.
    ///
    /// Same guarantees as [`spawn`](Self::spawn).
    pub fn spawn_blocking<F>(
        &self,
        job: Job,
        scope: Option<ExclusiveScope>,
        body: F,
    ) -> ProgressReceiver
    where
        F: FnOnce(ProgressSender) -> JobResult<()> + Send + 'static,
    {
        let (progress, receiver) = progress_channel();
        let context = self.start(&job, &progress);
        let emitter = progress.clone();
        let worker = tokio::task::spawn_blocking(move || body(emitter));
        tokio::spawn(self.clone().supervise(job, context, progress, scope, worker));
        receiver
    }

    fn start(&self, job: &Job, progress: &ProgressSender) -> JobExecutionContext {
        self.inner
            .active
            .write()
            .insert(job.id, JobSnapshot::running(job));

        let context = JobExecutionContext::new(job);
        context.log_start();
        if let Some(line) = job.kind().start_line() {
            progress.send(line);
        }
        context
    }

    async fn supervise(
        self,
        job: Job,
        context: JobExecutionContext,
        progress: ProgressSender,
        scope: Option<ExclusiveScope>,
        worker: JoinHandle<JobResult<()>>,
    ) {
        let status = match worker.await {
            Ok(Ok(())) => {
                progress.send(job.kind().success_line());
                context.log_completion();
                JobStatus::Completed {
                    completed_at: Utc::now(),
                }
            }
            Ok(Err(err)) => {
                let message = err.to_string();
                context.log_failure(&message);
                progress.send(error_line(&message));
                JobStatus::Failed {
                    failed_at: Utc::now(),
                    error: message,
                }
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    let message = panic_message(join_error.into_panic());
                    context.log_panic(&message);
                    message
                } else {
                    context.log_aborted();
                    "Job was cancelled before it finished".to_string()
                };
                progress.send(error_line(&message));
                JobStatus::Failed {
                    failed_at: Utc::now(),
                    error: message,
                }
            }
        };

        progress.close();
        drop(scope);
        self.finish(job.id, status);
    }

    fn finish(&self, id: JobId, status: JobStatus) {
        let Some(mut snapshot) = self.inner.active.write().remove(&id) else {
            return;
        };
        snapshot.status = status;

        let mut recent = self.inner.recent.lock();
        if self.inner.history_limit == 0 {
            return;
        }
        while recent.len() >= self.inner.history_limit {
            recent.pop_back();
        }
        recent.push_front(snapshot);
    }

    /// Snapshots of jobs that are still running.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<_> = self.inner.active.read().values().cloned().collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    /// Snapshots of finished jobs, newest first.
    #[must_use]
    pub fn recent_jobs(&self) -> Vec<JobSnapshot> {
        self.inner.recent.lock().iter().cloned().collect()
    }

    /// Number of jobs still running.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    /// Wait for all running jobs to finish.
    ///
    /// Returns `true` if the runner became idle within `max_wait`.
    pub async fn wait_for_idle(&self, max_wait: Duration) -> bool {
        let start = Instant::now();

        loop {
            if self.active_count() == 0 {
                info!("All jobs completed");
                return true;
            }

            if start.elapsed() >= max_wait {
                warn!(
                    remaining = self.active_count(),
                    "Timeout waiting for job completion"
                );
                return false;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Job worker panicked".to_string()
    }
}
