//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Settings root → Platform chain (attaches settings)
//!     → Load settings file → Runner slot + bridge → AppState
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close websockets
//!     → Stop runner → Dump settings → Exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then settings and pipeline, then listeners
//! - Any startup error is fatal before a listener is bound

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{assemble, Runtime, StartupError};
