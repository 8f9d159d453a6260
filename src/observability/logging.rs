//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber once at startup
//! - Honor `RUST_LOG` over the configured level
//!
//! # Design Decisions
//! - Human-readable fmt output; the service runs next to a game, not in a log pipeline
//! - Initializing twice is harmless (tests spin up several servers per process)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when neither `RUST_LOG` nor config set one.
pub const DEFAULT_DIRECTIVE: &str = "autopilot=info,tower_http=info";

/// Build the filter: `RUST_LOG` wins, then `level`, then [`DEFAULT_DIRECTIVE`].
pub fn filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(level) => EnvFilter::try_new(format!("autopilot={level},tower_http={level}"))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
        None => EnvFilter::new(DEFAULT_DIRECTIVE),
    })
}

/// Install the global subscriber. Returns false if one was already installed.
pub fn init(level: Option<&str>) -> bool {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
