//! Named callbacks exposed by chain elements.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

/// A function a client may invoke with `call`.
pub type Callback = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Errors returned by [`CallbackRegistry::call`].
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("function '{0}' does not exist")]
    NotFound(String),

    #[error("function '{name}' failed: {reason}")]
    Failed { name: String, reason: String },
}

/// Thread-safe registry of callbacks keyed by name.
#[derive(Default)]
pub struct CallbackRegistry {
    inner: DashMap<String, Callback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, callback: Callback) {
        let name = name.into();
        if self.inner.insert(name.clone(), callback).is_some() {
            tracing::warn!(name = %name, "Callback replaced");
        }
    }

    /// Invoke the callback registered under `name`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, CallbackError> {
        // Clone out of the map so the shard lock is not held while the callback runs.
        let callback = self
            .inner
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CallbackError::NotFound(name.to_string()))?;

        callback(args).map_err(|reason| CallbackError::Failed {
            name: name.to_string(),
            reason,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("names", &self.names())
            .finish()
    }
}
