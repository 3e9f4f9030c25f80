//! # herald
//!
//! Herald binary: loads settings, installs logging and metrics, and serves
//! push streams until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use herald_server::config::ServerConfig;
use herald_server::server::HeraldServer;
use herald_settings::HeraldSettings;

/// Herald server-push service.
#[derive(Parser, Debug)]
#[command(name = "herald", about = "Server-push (SSE) notification service")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.herald/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Maximum concurrent push connections (overrides settings).
    #[arg(long)]
    max_connections: Option<usize>,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(herald_settings::settings_path)
    }

    /// Layer explicit flags over loaded settings.
    fn apply(&self, settings: &mut HeraldSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(max) = self.max_connections {
            settings.server.max_connections = max;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.settings_path();
    // Warnings about ignored HERALD_* values are emitted while loading,
    // before the configured subscriber exists.
    let bootstrap_level = args.log_level.as_deref().unwrap_or("warn");
    let mut settings = herald_core::logging::with_bootstrap(bootstrap_level, || {
        herald_settings::load_settings_from_path(&settings_path)
    })
    .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    herald_core::logging::init(&settings.logging.level, settings.logging.json);

    let metrics_handle =
        herald_server::metrics::install_recorder().context("Failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings);
    let server = HeraldServer::new(config, metrics_handle);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    tracing::info!(
        heartbeat_ms = settings.push.heartbeat_interval_ms,
        timeout_ms = settings.push.connection_timeout_ms,
        "Herald listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.shutdown().graceful_shutdown(vec![handle], None).await {
        tracing::warn!("server did not drain before the shutdown timeout");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
