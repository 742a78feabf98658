//! CLI command implementations

pub mod config;
pub mod models;
pub mod serve;

pub use config::ConfigCommand;
pub use models::ModelsCommand;
pub use serve::ServeCommand;

use anyhow::{Context, Result};
use std::path::Path;
use voxtrain::config::VoxtrainConfig;

/// Load from `path` if given, otherwise from the standard search path
pub fn load_config(path: Option<&Path>) -> Result<VoxtrainConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            let path = path
                .to_str()
                .context("Configuration path is not valid UTF-8")?;
            VoxtrainConfig::load_from(path)
        }
        None => VoxtrainConfig::load_for_service(crate::SERVICE_NAME),
    }
}
