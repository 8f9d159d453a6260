//! Autopilot control server library.
//!
//! A settings tree with a persistent backing file, a background worker that
//! drives the processing chain, and a websocket surface that lets browsers
//! read and write settings, start and stop the worker, and receive its results.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod pool;
pub mod runner;
pub mod settings;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
