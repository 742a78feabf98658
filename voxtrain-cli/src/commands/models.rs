//! Model listing command

use super::load_config;
use anyhow::Result;
use console::{style, Emoji};
use std::path::PathBuf;
use voxtrain::models::{ModelCatalog, ModelStatus};

static YES: Emoji = Emoji("✓", "y");
static NO: Emoji = Emoji("✗", "n");

/// Print the configured models and whether each is downloaded and has sentences
pub struct ModelsCommand {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
}

impl ModelsCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded.
    pub fn execute(&self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        let catalog = ModelCatalog::new(config.models.clone());

        if catalog.is_empty() {
            println!(
                "{} Add [[models]] entries to the configuration file.",
                style("No models configured.").yellow().bold()
            );
            return Ok(());
        }

        println!(
            "{:<32} {:<11} {:<10} {}",
            style("MODEL").bold(),
            style("DOWNLOADED").bold(),
            style("SENTENCES").bold(),
            style("DESCRIPTION").bold()
        );
        for model in catalog.iter() {
            let status = ModelStatus::inspect(model, &config.storage, false);
            println!(
                "{:<32} {:<11} {:<10} {}",
                status.id,
                mark(status.downloaded),
                mark(status.has_sentences),
                style(&status.description).dim()
            );
        }

        Ok(())
    }
}

fn mark(value: bool) -> String {
    if value {
        style(YES).green().to_string()
    } else {
        style(NO).red().to_string()
    }
}
