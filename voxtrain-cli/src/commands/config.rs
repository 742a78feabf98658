//! Configuration file commands

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use std::path::Path;
use voxtrain::config::VoxtrainConfig;

/// Configuration commands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the user configuration path
    Path,
    /// Write a default configuration file to the user configuration path
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be created or the
    /// file cannot be written.
    pub fn execute(&self) -> Result<()> {
        match self {
            Self::Path => {
                println!(
                    "{}",
                    VoxtrainConfig::recommended_path(crate::SERVICE_NAME).display()
                );
                Ok(())
            }
            Self::Init { force } => {
                let path = VoxtrainConfig::create_config_dir(crate::SERVICE_NAME)?;
                write_default_config(&path, *force)?;
                println!(
                    "{} {}",
                    style("Wrote").green().bold(),
                    style(path.display()).cyan()
                );
                Ok(())
            }
        }
    }
}

/// Write the default configuration to `path`
fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    let rendered = VoxtrainConfig::default().to_toml()?;
    std::fs::write(path, rendered)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        write_default_config(&path, false).unwrap();
        let loaded = VoxtrainConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.server.port, VoxtrainConfig::default().server.port);
    }

    #[test]
    fn test_write_default_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(write_default_config(&path, false).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");

        write_default_config(&path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[server]"));
    }
}
