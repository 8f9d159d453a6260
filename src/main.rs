//! Autopilot control server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Browser ──HTTP──▶ /, /settings, /status
//!   Browser ◀─ws──▶ /ws/{topic} ──get/set──▶ SettingsStore ──dump──▶ settings.json
//!                       │
//!                       ├─activate/deactivate──▶ RunnerSlot ──▶ BackgroundRunner (OS thread)
//!                       │                                              │
//!                       │                                    ProcessingChain::process
//!                       │                                              │
//!                       ◀──── ConnectionPool::broadcast ◀── BridgeDrain ◀── Bridge
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use autopilot::config::{apply_overrides, load_config, AppConfig};
use autopilot::lifecycle::{self, signals, Shutdown};
use autopilot::observability::{logging, metrics};
use autopilot::HttpServer;

/// Autopilot control server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the settings file path.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    let config = apply_overrides(config, cli.settings, cli.bind)?;

    logging::init(Some(&config.observability.log_level));
    tracing::info!("autopilot v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                metrics::init_metrics(addr);
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let runtime = lifecycle::assemble(&config, shutdown.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    signals::spawn_ctrl_c_handler(shutdown);
    HttpServer::new(runtime).run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
