//! Configuration management for voxtrain
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `VOXTRAIN_` prefix)
//! 2. `./config.toml` (development)
//! 3. `~/.config/voxtrain/{service}/config.toml` (user config, XDG)
//! 4. `/etc/voxtrain/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [server]
//! host = "0.0.0.0"
//! port = 8099
//!
//! [storage]
//! models_dir = "/data/models"
//! train_dir = "/data/train"
//! tools_dir = "/opt/speech-tools"
//!
//! [jobs]
//! busy_policy = "reject"
//! report_interval_ms = 1000
//!
//! [training]
//! program = "rhasspy-speech-train"
//!
//! [[models]]
//! id = "en_US-rhasspy"
//! url = "https://example.org/models/en_US-rhasspy.tar.gz"
//! description = "English (US)"
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use voxtrain::config::VoxtrainConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = VoxtrainConfig::load_for_service("voxtrain")?;
//! let port = config.server.port;
//! # Ok(())
//! # }
//! ```

use crate::models::ModelSpec;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind
    pub host: String,

    /// Port to bind
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8099,
        }
    }
}

impl ServerSettings {
    /// `host:port` string suitable for `TcpListener::bind`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// On-disk locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory that downloaded models are extracted into (one subdirectory per model)
    pub models_dir: PathBuf,

    /// Directory holding per-model sentence files and training output
    pub train_dir: PathBuf,

    /// Directory containing kaldi, phonetisaurus, opengrm and openfst
    pub tools_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./data/models"),
            train_dir: PathBuf::from("./data/train"),
            tools_dir: PathBuf::from("./tools"),
        }
    }
}

impl StorageSettings {
    /// Extracted model directory for `model_id`
    #[must_use]
    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.models_dir.join(model_id)
    }

    /// Training directory for `model_id`
    #[must_use]
    pub fn model_train_dir(&self, model_id: &str) -> PathBuf {
        self.train_dir.join(model_id)
    }

    /// Sentence file for `model_id`
    #[must_use]
    pub fn sentences_path(&self, model_id: &str) -> PathBuf {
        self.model_train_dir(model_id).join("sentences.yaml")
    }
}

/// What to do when a job is requested for a key that is already busy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Wait for the running job to finish, then start
    #[default]
    Queue,
    /// Refuse immediately with `409 Conflict`
    Reject,
}

/// Job execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Behavior for a second job on a busy key
    pub busy_policy: BusyPolicy,

    /// Minimum time between download progress lines, in milliseconds
    pub report_interval_ms: u64,

    /// How long shutdown waits for running jobs, in seconds
    pub shutdown_timeout_secs: u64,

    /// Number of finished jobs remembered for `GET /api/jobs`
    pub history_limit: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            busy_policy: BusyPolicy::Queue,
            report_interval_ms: 1000,
            shutdown_timeout_secs: 30,
            history_limit: crate::jobs::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl JobSettings {
    /// Download progress interval as Duration
    #[must_use]
    pub const fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// Shutdown grace period as Duration
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// External training program
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Program to run (looked up on `PATH` when not absolute)
    pub program: PathBuf,

    /// Extra arguments placed before the generated ones, e.g. `["-m", "module"]`
    pub extra_args: Vec<String>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("rhasspy-speech-train"),
            extra_args: Vec::new(),
        }
    }
}

/// Complete voxtrain configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VoxtrainConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerSettings,

    /// On-disk locations
    #[serde(default)]
    pub storage: StorageSettings,

    /// Job execution settings
    #[serde(default)]
    pub jobs: JobSettings,

    /// External training program
    #[serde(default)]
    pub training: TrainingSettings,

    /// Downloadable models
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

impl VoxtrainConfig {
    /// Load configuration for a specific service
    ///
    /// Searches for configuration in XDG-compliant locations with precedence:
    /// 1. Environment variables (`VOXTRAIN_*`, use `__` for nesting)
    /// 2. `./config.toml`
    /// 3. `~/.config/voxtrain/{service_name}/config.toml`
    /// 4. `/etc/voxtrain/{service_name}/config.toml`
    /// 5. Defaults
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use voxtrain::config::VoxtrainConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = VoxtrainConfig::load_for_service("voxtrain")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config: /etc/voxtrain/{service_name}/config.toml
        let system_config = PathBuf::from("/etc/voxtrain")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config: ~/.config/voxtrain/{service_name}/config.toml
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config: ./config.toml
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables (highest priority, double underscore for nesting)
        figment = figment.merge(Env::prefixed("VOXTRAIN_").split("__").lowercase(true));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// A missing file yields the defaults (plus environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - The file contains invalid TOML syntax
    /// - Configuration values fail type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use voxtrain::config::VoxtrainConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = VoxtrainConfig::load_from("./config/production.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("VOXTRAIN_").split("__").lowercase(true))
            .extract()?;

        Ok(config)
    }

    /// Get the recommended XDG config path for a service
    ///
    /// # Example
    ///
    /// ```rust
    /// use voxtrain::config::VoxtrainConfig;
    ///
    /// let path = VoxtrainConfig::recommended_path("voxtrain");
    /// // Returns: ~/.config/voxtrain/voxtrain/config.toml
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./config.toml"),
            |config_dir| {
                config_dir
                    .join("voxtrain")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    /// Create config directory for a service
    ///
    /// Returns the path the config file should be written to.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_config_dir(service_name: &str) -> anyhow::Result<PathBuf> {
        let config_path = Self::recommended_path(service_name);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(config_path)
    }

    /// Render this configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
