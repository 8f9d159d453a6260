//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! websocket upgrade
//!     → connection.rs (id, outbound queue, liveness)
//!     → registry.rs add(topic)
//!
//! broadcast(topic, message)
//!     → registry.rs (sweep dead connections on every topic)
//!     → connection.rs try_send per survivor
//!     → transport writer task drains the queue onto the socket
//! ```

pub mod connection;
pub mod registry;

pub use connection::{
    ClientConnection, ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker,
    OutboundConnection, SendError,
};
pub use registry::ConnectionPool;
