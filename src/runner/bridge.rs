//! Hand-off from the worker thread to the async broadcaster.
//!
//! # Responsibilities
//! - Accept messages from any thread without blocking
//! - Buffer them until the drain task picks them up
//! - Broadcast each drained message through the connection pool
//!
//! # Design Decisions
//! - Unbounded queue: the worker never waits on clients
//! - The drain task is the only place worker output touches the pool

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::pool::ConnectionPool;

/// One message bound for every connection on `topic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastMessage {
    pub topic: String,
    pub payload: String,
}

/// Sending half. Cheap to clone, usable outside the runtime.
#[derive(Debug, Clone)]
pub struct Bridge {
    tx: mpsc::UnboundedSender<BroadcastMessage>,
}

/// Receiving half, driven on the runtime.
#[derive(Debug)]
pub struct BridgeDrain {
    rx: mpsc::UnboundedReceiver<BroadcastMessage>,
}

/// Create a connected bridge pair.
pub fn channel() -> (Bridge, BridgeDrain) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Bridge { tx }, BridgeDrain { rx })
}

impl Bridge {
    /// Queue `payload` for `topic`. Returns false once the drain is gone.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<String>) -> bool {
        let message = BroadcastMessage {
            topic: topic.into(),
            payload: payload.into(),
        };
        match self.tx.send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(topic = %e.0.topic, "Bridge closed, dropping message");
                false
            }
        }
    }
}

impl BridgeDrain {
    /// Next queued message, or `None` once every [`Bridge`] is dropped.
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        self.rx.recv().await
    }

    /// Broadcast queued messages until shutdown or until every sender is gone.
    pub async fn run(mut self, pool: Arc<ConnectionPool>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Bridge drain starting");

        loop {
            tokio::select! {
                message = self.recv() => {
                    let Some(message) = message else {
                        tracing::info!("All bridge senders dropped, exiting loop");
                        break;
                    };
                    pool.broadcast(&message.topic, &message.payload);
                }
                _ = shutdown.recv() => {
                    tracing::info!("Bridge drain received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::pool::OutboundConnection;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_from_thread_reaches_pool() {
        let pool = Arc::new(ConnectionPool::new());
        let (conn, mut rx) = OutboundConnection::new(8);
        pool.add("main", conn);

        let (bridge, drain) = channel();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(drain.run(pool.clone(), shutdown.subscribe()));

        // Published before the drain polls: buffered, not lost.
        std::thread::spawn(move || {
            assert!(bridge.publish("main", "one"));
            assert!(bridge.publish("main", "two"));
        })
        .join()
        .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(first.as_deref(), Some("one"));
        assert_eq!(second.as_deref(), Some("two"));

        // Senders are gone, so the drain finishes on its own.
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_drain() {
        let (_bridge, drain) = channel();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(drain.run(Arc::new(ConnectionPool::new()), shutdown.subscribe()));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[test]
    fn test_publish_after_drain_dropped() {
        let (bridge, drain) = channel();
        drop(drain);
        assert!(!bridge.publish("main", "lost"));
    }
}
