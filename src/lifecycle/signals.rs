//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for Ctrl+C (SIGINT)
//! - Translate it into a graceful shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - If the handler cannot be installed the process keeps running; it can
//!   still be killed

use crate::lifecycle::Shutdown;

/// Resolve once Ctrl+C is pressed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Ctrl+C received");
}

/// Trigger `shutdown` on Ctrl+C.
pub fn spawn_ctrl_c_handler(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        ctrl_c().await;
        shutdown.trigger();
    })
}
