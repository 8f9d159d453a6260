//! Replies sent back to websocket clients.
//!
//! # Responsibilities
//! - Map subsystem errors onto the client-facing error kinds
//! - Build `ok` and `error` reply records and broadcast events
//!
//! # Design Decisions
//! - Every reply carries `status`; errors add a stable `error` kind and a
//!   human-readable `message`

use serde_json::{json, Value};
use thiserror::Error;

use crate::pipeline::CallbackError;
use crate::runner::RunnerError;
use crate::settings::SettingsError;

/// A command that could not be carried out.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("path '{0}' does not exist")]
    NotFound(String),

    #[error("invalid value for '{path}': {reason}")]
    Validation { path: String, reason: String },

    #[error("node '{0}' cannot be rendered")]
    NotRenderable(String),

    #[error("function '{0}' does not exist")]
    FunctionNotFound(String),

    #[error("function '{name}' failed: {reason}")]
    CallbackFailed { name: String, reason: String },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("settings error: {0}")]
    Settings(SettingsError),

    #[error("command task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CommandError {
    /// Stable kind reported in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::NotFound(_) => "not_found",
            CommandError::Validation { .. } => "validation_error",
            CommandError::NotRenderable(_) => "not_renderable",
            CommandError::FunctionNotFound(_) => "function_not_found",
            CommandError::CallbackFailed { .. } => "callback_failed",
            CommandError::Runner(_) => "runner_failed",
            CommandError::Settings(_) | CommandError::Task(_) => "internal_error",
        }
    }

    /// The `error` reply for this failure.
    pub fn to_reply(&self) -> Value {
        json!({
            "status": "error",
            "error": self.kind(),
            "message": self.to_string(),
        })
    }
}

impl From<SettingsError> for CommandError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::NotFound(path) => CommandError::NotFound(path),
            SettingsError::Validation { path, reason } => CommandError::Validation { path, reason },
            SettingsError::NotRenderable(path) => CommandError::NotRenderable(path),
            other => CommandError::Settings(other),
        }
    }
}

impl From<CallbackError> for CommandError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::NotFound(name) => CommandError::FunctionNotFound(name),
            CallbackError::Failed { name, reason } => CommandError::CallbackFailed { name, reason },
        }
    }
}

/// The `ok` reply to a `get` or `set`.
pub fn value_reply(path: &str, value: &str) -> Value {
    json!({ "status": "ok", "path": path, "value": value })
}

/// The `ok` reply to a `render`.
pub fn render_reply(path: &str, html: &str) -> Value {
    json!({ "status": "ok", "path": path, "html": html })
}

/// The `ok` reply to `activate` / `deactivate`.
pub fn running_reply(running: bool) -> Value {
    json!({ "status": "ok", "running": running })
}

/// The `ok` reply to a `call`.
pub fn call_reply(name: &str, result: Value) -> Value {
    json!({ "status": "ok", "name": name, "result": result })
}

/// Event broadcast to the topic after a successful `set`.
pub fn setting_changed(path: &str, value: &str) -> Value {
    json!({ "event": "setting_changed", "path": path, "value": value })
}
