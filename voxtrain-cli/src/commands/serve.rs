//! HTTP service command

use super::load_config;
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};
use voxtrain::handlers::router;
use voxtrain::observability::{self, ObservabilityConfig};
use voxtrain::state::AppState;

/// Run the HTTP service until interrupted
pub struct ServeCommand {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// Listen address override
    pub host: Option<String>,
    /// Listen port override
    pub port: Option<u16>,
    /// Fallback log filter
    pub log_filter: Option<String>,
}

impl ServeCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logging cannot be initialized
    /// - The configuration cannot be loaded
    /// - The listen address cannot be bound
    pub async fn execute(self) -> Result<()> {
        let mut logging = ObservabilityConfig::new(crate::SERVICE_NAME);
        if let Some(filter) = self.log_filter {
            logging = logging.with_filter(filter);
        }
        observability::init(&logging)?;

        let mut config = load_config(self.config.as_deref())?;
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }

        let address = config.server.bind_address();
        let shutdown_timeout = config.jobs.shutdown_timeout();
        let busy_policy = config.jobs.busy_policy;
        let state = AppState::with_config(config)?;
        let runner = state.runner().clone();

        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;
        info!(
            %address,
            models = state.models().len(),
            ?busy_policy,
            "voxtrain listening"
        );
        println!(
            "{} {}",
            style("Listening on").green().bold(),
            style(format!("http://{address}")).cyan()
        );

        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        let active = runner.active_count();
        if active > 0 {
            info!(active, "Waiting for running jobs before exit");
            println!(
                "{} {active} running job(s)...",
                style("Waiting for").yellow().bold()
            );
        }
        if !runner.wait_for_idle(shutdown_timeout).await {
            warn!(
                remaining = runner.active_count(),
                "Exiting with jobs still running"
            );
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
