//! Application state management
//!
//! One [`AppState`] is built at startup and cloned into every handler. It owns
//! the job runner, the per-model lock table and the two job collaborators.

use crate::config::{BusyPolicy, VoxtrainConfig};
use crate::download::{ArchiveSource, HttpArchiveSource};
use crate::error::VoxtrainResult;
use crate::jobs::{ExclusiveScope, JobRunner, ResourceGuard, ResourceKey};
use crate::models::{validate_model_id, ModelCatalog};
use crate::training::{CommandTrainer, Trainer};
use crate::transcriber::Transcriber;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared by all handlers
///
/// # Example
///
/// ```rust
/// use voxtrain::config::VoxtrainConfig;
/// use voxtrain::state::AppState;
///
/// # fn example() -> anyhow::Result<()> {
/// let state = AppState::with_config(VoxtrainConfig::default())?;
/// let app = voxtrain::handlers::router(state);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    config: Arc<VoxtrainConfig>,
    models: Arc<ModelCatalog>,
    runner: JobRunner,
    guard: Arc<ResourceGuard<Transcriber>>,
    archives: Arc<dyn ArchiveSource>,
    trainer: Arc<dyn Trainer>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("models", &self.models.len())
            .field("runner", &self.runner)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create state with the HTTP archive source and the configured trainer
    ///
    /// # Errors
    ///
    /// Returns an error if a configured model id is unusable or the HTTP
    /// client cannot be built.
    pub fn with_config(config: VoxtrainConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("voxtrain/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        let trainer = CommandTrainer::new(&config.training);

        Self::with_collaborators(
            config,
            Arc::new(HttpArchiveSource::new(client)),
            Arc::new(trainer),
        )
    }

    /// Create state with explicit job collaborators
    ///
    /// # Errors
    ///
    /// Returns an error if a configured model id is unusable.
    pub fn with_collaborators(
        config: VoxtrainConfig,
        archives: Arc<dyn ArchiveSource>,
        trainer: Arc<dyn Trainer>,
    ) -> anyhow::Result<Self> {
        for model in &config.models {
            validate_model_id(&model.id)
                .map_err(|err| anyhow::anyhow!("invalid model in configuration: {err}"))?;
        }

        let models = ModelCatalog::new(config.models.clone());
        let runner = JobRunner::new(config.jobs.history_limit);

        Ok(Self {
            config: Arc::new(config),
            models: Arc::new(models),
            runner,
            guard: Arc::new(ResourceGuard::new()),
            archives,
            trainer,
        })
    }

    /// Get configuration reference
    #[must_use]
    pub fn config(&self) -> &VoxtrainConfig {
        &self.config
    }

    /// Configured models
    #[must_use]
    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    /// Background job runner
    #[must_use]
    pub const fn runner(&self) -> &JobRunner {
        &self.runner
    }

    /// Per-model lock table with cached transcribers
    #[must_use]
    pub fn guard(&self) -> &ResourceGuard<Transcriber> {
        &self.guard
    }

    /// Where model archives are fetched from
    #[must_use]
    pub fn archives(&self) -> Arc<dyn ArchiveSource> {
        Arc::clone(&self.archives)
    }

    /// Model trainer
    #[must_use]
    pub fn trainer(&self) -> Arc<dyn Trainer> {
        Arc::clone(&self.trainer)
    }

    /// Take exclusive access to `key` according to the configured busy policy
    ///
    /// # Errors
    ///
    /// [`VoxtrainError::Busy`](crate::error::VoxtrainError::Busy) under the
    /// `reject` policy when a job already holds `key`.
    pub async fn begin_job(&self, key: ResourceKey) -> VoxtrainResult<ExclusiveScope> {
        match self.config.jobs.busy_policy {
            BusyPolicy::Queue => Ok(self.guard.begin_exclusive(key).await),
            BusyPolicy::Reject => Ok(self.guard.try_begin_exclusive(key).await?),
        }
    }
}
