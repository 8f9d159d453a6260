//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define autopilot metrics (iterations, broadcasts, evictions, connections)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `autopilot_pipeline_iterations_total` (counter): iterations by outcome (`ok`, `error`)
//! - `autopilot_broadcast_messages_total` (counter): messages delivered to clients
//! - `autopilot_connections_evicted_total` (counter): closed connections dropped from the pool
//! - `autopilot_ws_connections` (gauge): open websocket clients
//! - `autopilot_settings_writes_total` (counter): successful `set` operations
//!
//! # Design Decisions
//! - Recording is a cheap no-op until a recorder is installed
//! - The exporter failing to start is logged, never fatal

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> bool {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics endpoint started");
            true
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter");
            false
        }
    }
}

/// One pipeline iteration finished with `outcome`.
pub fn record_iteration(outcome: &'static str) {
    metrics::counter!("autopilot_pipeline_iterations_total", "outcome" => outcome).increment(1);
}

/// `delivered` clients received a broadcast.
pub fn record_broadcast(delivered: usize) {
    metrics::counter!("autopilot_broadcast_messages_total").increment(delivered as u64);
}

/// `count` connections were evicted from the pool.
pub fn record_eviction(count: usize) {
    metrics::counter!("autopilot_connections_evicted_total").increment(count as u64);
}

pub fn set_ws_connections(count: usize) {
    metrics::gauge!("autopilot_ws_connections").set(count as f64);
}

pub fn record_settings_write() {
    metrics::counter!("autopilot_settings_writes_total").increment(1);
}
