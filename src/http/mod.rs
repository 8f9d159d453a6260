//! HTTP and websocket surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, tracing layer)
//!     → GET /, /settings, /settings.json, /status
//!     → GET /ws/{topic}
//!         → websocket.rs (upgrade, register in pool)
//!         → request.rs (parse command)
//!         → response.rs (reply or error kind)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::ClientCommand;
pub use response::CommandError;
pub use server::{AppState, HttpServer};
