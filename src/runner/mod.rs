//! Background execution subsystem.
//!
//! # Data Flow
//! ```text
//! client `activate` / `deactivate`
//!     → slot.rs (current instance, replaced once fully exited)
//!     → background.rs start/stop (flag under the instance lock)
//!
//! worker thread (one per running instance)
//!     → Pipeline::process
//!     → bridge.rs publish (sync, unbounded)
//!     → BridgeDrain on the runtime
//!     → ConnectionPool::broadcast
//! ```

pub mod background;
pub mod bridge;
pub mod slot;

use thiserror::Error;

pub use background::{BackgroundRunner, SharedPipeline};
pub use bridge::{Bridge, BridgeDrain, BroadcastMessage};
pub use slot::RunnerSlot;

/// Errors raised while controlling the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
