//! Settings persistence.
//!
//! # Responsibilities
//! - Own the settings tree behind a lock shared by all handlers
//! - Restore stored values on `load`
//! - Persist the tree on `dump`, merged over what the file already holds
//!
//! # Design Decisions
//! - The backing file is a flat JSON object `fqid -> value`
//! - An absent, empty or malformed file reads as an empty mapping; `load` never fails
//! - `dump` keeps stored keys the current tree no longer has, so settings of
//!   elements missing from this build survive a save
//! - Writers are serialized by the lock; readers see the last completed write
//! - Saving works on a snapshot taken under the lock, so file I/O never blocks
//!   readers; a separate persist lock keeps saves in write order

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use serde_json::Value;

use crate::observability::metrics;
use crate::settings::error::{SettingsError, SettingsResult};
use crate::settings::node::SettingsNode;

/// The settings tree together with its backing file.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    root: RwLock<SettingsNode>,
    persist: Mutex<()>,
}

impl SettingsStore {
    /// Create a store for `root` backed by the file at `path`.
    ///
    /// Nothing is read until [`load`](Self::load) is called.
    pub fn new(path: impl Into<PathBuf>, root: SettingsNode) -> Self {
        Self {
            path: path.into(),
            root: RwLock::new(root),
            persist: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with shared access to the tree.
    pub fn read<R>(&self, f: impl FnOnce(&SettingsNode) -> R) -> R {
        let root = self.root.read().unwrap_or_else(PoisonError::into_inner);
        f(&root)
    }

    /// Run `f` with exclusive access to the tree.
    pub fn write<R>(&self, f: impl FnOnce(&mut SettingsNode) -> R) -> R {
        let mut root = self.root.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut root)
    }

    /// Attach a subtree under the root.
    pub fn attach(&self, subtree: SettingsNode) -> SettingsResult<()> {
        self.write(|root| root.add_child(subtree).map(|_| ()))
    }

    /// Value at `path`.
    pub fn get_value(&self, path: &str) -> SettingsResult<String> {
        self.read(|root| root.get_value(path).map(str::to_owned))
    }

    /// Write `value` at `path` and persist the tree.
    ///
    /// Returns the value read back after the write. A failure to persist is
    /// logged; the in-memory write stands.
    pub fn set_value(&self, path: &str, value: impl Into<String>) -> SettingsResult<String> {
        let _persisting = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        let (written, snapshot) = self.write(|root| -> SettingsResult<_> {
            root.set_value(path, value)?;
            Ok((root.get_value(path)?.to_owned(), root.flatten()))
        })?;
        metrics::record_settings_write();

        if let Err(e) = save_merged(&self.path, snapshot) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist settings");
        }
        Ok(written)
    }

    /// Render the node at `path`.
    pub fn render(&self, path: &str) -> SettingsResult<String> {
        self.read(|root| {
            root.resolve(path)
                .ok_or_else(|| SettingsError::NotFound(path.to_string()))?
                .render()
        })
    }

    /// Restore stored values into the tree. Returns the number of entries applied.
    pub fn load(&self) -> usize {
        let stored = read_flat(&self.path);
        let applied = self.write(|root| root.fill_from_flat(&stored));
        tracing::info!(
            path = %self.path.display(),
            stored = stored.len(),
            applied,
            "Settings loaded"
        );
        applied
    }

    /// Persist the tree, merged over the file's current content.
    pub fn dump(&self) -> SettingsResult<()> {
        let _persisting = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        save_merged(&self.path, self.flatten())
    }

    /// Flat `fqid -> value` view of the current tree.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        self.read(SettingsNode::flatten)
    }
}

fn save_merged(path: &Path, snapshot: BTreeMap<String, String>) -> SettingsResult<()> {
    let mut merged = read_flat(path);
    merged.extend(snapshot);

    let encoded = serde_json::to_string_pretty(&merged)?;
    fs::write(path, encoded)?;
    tracing::debug!(path = %path.display(), entries = merged.len(), "Settings saved");
    Ok(())
}

/// Read the backing file as a flat mapping. Never fails.
fn read_flat(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cannot read settings file");
            return BTreeMap::new();
        }
    };

    if content.trim().is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str::<BTreeMap<String, Value>>(&content) {
        Ok(entries) => entries
            .into_iter()
            .map(|(fqid, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (fqid, value)
            })
            .collect(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Invalid settings file, ignoring its content");
            BTreeMap::new()
        }
    }
}
