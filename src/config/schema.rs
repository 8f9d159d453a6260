//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the autopilot server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Settings backing file.
    pub settings: SettingsConfig,

    /// Background runner behaviour.
    pub runner: RunnerConfig,

    /// Processing chain selection.
    pub pipeline: PipelineConfig,

    /// Per-client connection limits.
    pub connections: ConnectionsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Settings persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Path of the flat JSON settings file.
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("settings.json"),
        }
    }
}

/// Background runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Topic pipeline results are broadcast on.
    pub topic: String,

    /// Pause between iterations in milliseconds (0 = run back to back).
    pub iteration_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            topic: "main".to_string(),
            iteration_interval_ms: 50,
        }
    }
}

/// Processing chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Platform whose chain is assembled (`linux`, `windows`).
    pub platform: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
        }
    }
}

/// Client connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    /// Outbound messages queued per client before it is evicted.
    pub send_buffer: usize,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self { send_buffer: 256 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
