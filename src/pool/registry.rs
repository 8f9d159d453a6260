//! Topic-keyed registry of live client connections.
//!
//! # Responsibilities
//! - Track which connections listen on which topic
//! - Fan a message out to every connection of a topic
//! - Evict connections that closed, half-closed or stopped accepting messages
//!
//! # Design Decisions
//! - One mutex covers membership; it is never held across an `.await`
//! - Every broadcast first sweeps all topics for dead connections
//! - A failing connection is evicted, closed, and delivery continues to the rest
//! - The pool holds handles only; transports own connection lifetimes

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::observability::metrics;
use crate::pool::connection::{ClientConnection, ConnectionId};

/// Topic → connections subscribed to it.
#[derive(Default)]
pub struct ConnectionPool {
    topics: Mutex<HashMap<String, Vec<Arc<dyn ClientConnection>>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `conn` to `topic`. Adding the same connection twice is a no-op.
    pub fn add(&self, topic: &str, conn: Arc<dyn ClientConnection>) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let members = topics.entry(topic.to_string()).or_default();
        if members.iter().any(|c| c.id() == conn.id()) {
            return;
        }
        tracing::debug!(topic, connection_id = %conn.id(), "Connection added");
        members.push(conn);
    }

    /// Unsubscribe the connection `id` from `topic`. Unknown ids are ignored.
    pub fn remove(&self, topic: &str, id: ConnectionId) {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(members) = topics.get_mut(topic) {
            members.retain(|c| c.id() != id);
            if members.is_empty() {
                topics.remove(topic);
            }
            tracing::debug!(topic, connection_id = %id, "Connection removed");
        }
    }

    /// Send `message` to every usable connection on `topic`.
    ///
    /// Returns the number of connections that accepted it.
    pub fn broadcast(&self, topic: &str, message: &str) -> usize {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let mut evicted = sweep(&mut topics);

        let mut delivered = 0;
        if let Some(members) = topics.get_mut(topic) {
            members.retain(|conn| match conn.send(message) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    tracing::warn!(topic, connection_id = %conn.id(), error = %e, "Send failed, evicting connection");
                    conn.close();
                    evicted += 1;
                    false
                }
            });
            if members.is_empty() {
                topics.remove(topic);
            }
        }
        drop(topics);

        if evicted > 0 {
            metrics::record_eviction(evicted);
        }
        metrics::record_broadcast(delivered);
        tracing::trace!(topic, delivered, evicted, "Broadcast");
        delivered
    }

    /// Number of connections on `topic`.
    pub fn len(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).map_or(0, Vec::len)
    }

    /// Number of connections across all topics.
    pub fn total(&self) -> usize {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics.values().map(Vec::len).sum()
    }

    /// Topics with at least one connection, sorted.
    pub fn topics(&self) -> Vec<String> {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Drop every connection that is no longer open. Returns how many were dropped.
fn sweep(topics: &mut HashMap<String, Vec<Arc<dyn ClientConnection>>>) -> usize {
    let mut evicted = 0;
    topics.retain(|topic, members| {
        members.retain(|conn| {
            let state = conn.state();
            if state.is_usable() {
                return true;
            }
            tracing::debug!(topic = %topic, connection_id = %conn.id(), ?state, "Evicting dead connection");
            conn.close();
            evicted += 1;
            false
        });
        !members.is_empty()
    });
    evicted
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("topics", &self.topics())
            .field("connections", &self.total())
            .finish()
    }
}
