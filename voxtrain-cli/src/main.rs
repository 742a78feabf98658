//! voxtrain command line

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ConfigCommand, ModelsCommand, ServeCommand};
use std::path::PathBuf;

/// Service name used for config lookup and logging
pub const SERVICE_NAME: &str = "voxtrain";

#[derive(Parser)]
#[command(name = "voxtrain")]
#[command(version)]
#[command(about = "Download and train speech-to-text models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Configuration file (defaults to the standard search path)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the listen address
        #[arg(long)]
        host: Option<String>,
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Log filter used when `RUST_LOG` is unset
        #[arg(long)]
        log_filter: Option<String>,
    },
    /// List configured models and their state on disk
    Models {
        /// Configuration file (defaults to the standard search path)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            log_filter,
        } => {
            ServeCommand {
                config,
                host,
                port,
                log_filter,
            }
            .execute()
            .await?;
        }
        Commands::Models { config } => {
            ModelsCommand { config }.execute()?;
        }
        Commands::Config { command } => {
            command.execute()?;
        }
    }

    Ok(())
}
