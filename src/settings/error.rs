//! Settings tree error definitions.

use thiserror::Error;

/// Errors raised by the settings tree and its backing store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The path does not resolve to a node.
    #[error("no setting at path '{0}'")]
    NotFound(String),

    /// The value was rejected for the addressed node.
    #[error("invalid value for '{path}': {reason}")]
    Validation { path: String, reason: String },

    /// The node has no widget attached.
    #[error("setting '{0}' has no widget and cannot be rendered")]
    NotRenderable(String),

    /// A sibling with the same key already exists under the parent.
    #[error("'{parent}' already has a child named '{key}'")]
    DuplicateKey { parent: String, key: String },

    /// Keys must be non-empty and must not contain the path separator.
    #[error("invalid settings key '{0}'")]
    InvalidKey(String),

    /// Writing the backing file failed.
    #[error("failed to write settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the flat mapping failed.
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
