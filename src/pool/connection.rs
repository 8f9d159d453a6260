//! Client connection handles and lifetime tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Expose the liveness a transport reports (Open → HalfClosed → Closed)
//! - Queue outbound text per connection, in order, with a bounded buffer
//! - Count open websocket clients
//!
//! # Design Decisions
//! - The pool never awaits a send: `send` is `try_send` into the connection's queue
//! - A writer task owned by the transport drains the queue onto the socket
//! - A dropped receiver (writer gone) makes the connection read as Closed
//! - Closing from the pool side wakes the transport so it drops the socket

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough: only uniqueness is needed.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Liveness of a connection as reported by its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Both directions usable.
    Open,
    /// The peer started closing; nothing more should be sent.
    HalfClosed,
    /// Gone.
    Closed,
}

impl ConnectionState {
    /// Whether the pool should keep sending to this connection.
    pub fn is_usable(self) -> bool {
        self == ConnectionState::Open
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Open => 0,
            ConnectionState::HalfClosed => 1,
            ConnectionState::Closed => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Open,
            1 => ConnectionState::HalfClosed,
            _ => ConnectionState::Closed,
        }
    }
}

/// Why a message could not be handed to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("connection is closed")]
    Closed,

    #[error("outbound buffer is full")]
    Full,
}

/// A connection the pool can broadcast to.
pub trait ClientConnection: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn state(&self) -> ConnectionState;

    /// Queue `message` without waiting.
    fn send(&self, message: &str) -> Result<(), SendError>;

    /// Mark the connection Closed and ask its transport to shut down.
    fn close(&self);
}

/// A connection backed by a bounded outbound queue.
#[derive(Debug)]
pub struct OutboundConnection {
    id: ConnectionId,
    state: AtomicU8,
    tx: mpsc::Sender<String>,
    close_requested: Notify,
}

impl OutboundConnection {
    /// Create a connection with room for `capacity` queued messages.
    ///
    /// The receiver belongs to the transport's writer task.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Arc::new(Self {
            id: ConnectionId::new(),
            state: AtomicU8::new(ConnectionState::Open.as_u8()),
            tx,
            close_requested: Notify::new(),
        });
        (conn, rx)
    }

    /// Record the liveness reported by the transport. Closed is final.
    pub fn mark(&self, state: ConnectionState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (ConnectionState::from_u8(current) != ConnectionState::Closed).then_some(state.as_u8())
            });
    }

    /// Resolves once [`close`](ClientConnection::close) has been called.
    ///
    /// A close requested before the first wait is not lost.
    pub async fn close_requested(&self) {
        self.close_requested.notified().await;
    }
}

impl ClientConnection for OutboundConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn state(&self) -> ConnectionState {
        if self.tx.is_closed() {
            return ConnectionState::Closed;
        }
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send(&self, message: &str) -> Result<(), SendError> {
        if !self.state().is_usable() {
            return Err(SendError::Closed);
        }
        self.tx.try_send(message.to_owned()).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn close(&self) {
        self.mark(ConnectionState::Closed);
        self.close_requested.notify_one();
    }
}

/// Counts open websocket clients.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new client. Returns a guard that decrements on drop.
    pub fn track(&self, id: ConnectionId) -> ConnectionGuard {
        let count = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_ws_connections(count as usize);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id,
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks a client's lifetime.
/// Decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let count = self.active_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_ws_connections(count as usize);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track(ConnectionId::new());
        let guard2 = tracker.track(ConnectionId::new());
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);
        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn outbound_preserves_order() {
        let (conn, mut rx) = OutboundConnection::new(4);
        conn.send("a").unwrap();
        conn.send("b").unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }

    #[test]
    fn outbound_full_buffer() {
        let (conn, _rx) = OutboundConnection::new(1);
        conn.send("a").unwrap();
        assert_eq!(conn.send("b"), Err(SendError::Full));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn dropped_receiver_reads_closed() {
        let (conn, rx) = OutboundConnection::new(1);
        drop(rx);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.send("a"), Err(SendError::Closed));
    }

    #[tokio::test]
    async fn close_wakes_transport() {
        let (conn, _rx) = OutboundConnection::new(1);
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.send("a"), Err(SendError::Closed));
        tokio::time::timeout(std::time::Duration::from_secs(1), conn.close_requested())
            .await
            .expect("close request must be observed");
    }

    #[test]
    fn closed_is_final() {
        let (conn, _rx) = OutboundConnection::new(1);
        conn.mark(ConnectionState::HalfClosed);
        assert_eq!(conn.state(), ConnectionState::HalfClosed);
        conn.mark(ConnectionState::Closed);
        conn.mark(ConnectionState::Open);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
