//! Inbound websocket commands.
//!
//! # Responsibilities
//! - Parse client text frames into typed commands
//! - Turn the `value` of a `set` into the string the settings tree stores
//!
//! # Design Decisions
//! - Records are tagged by their `command` field
//! - Anything that does not parse (including unknown commands) is reported to
//!   the caller as `None` and dropped; the connection stays open

use serde::Deserialize;
use serde_json::Value;

use crate::http::response::CommandError;

/// A command sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Read the value at `path`.
    Get { path: String },

    /// Write `value` at `path`.
    Set {
        path: String,
        #[serde(default)]
        value: Option<Value>,
    },

    /// Render the node at `path` to HTML.
    Render { path: String },

    /// Start the background runner.
    Activate,

    /// Stop the background runner.
    Deactivate,

    /// Invoke the callback registered as `name`.
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl ClientCommand {
    /// Parse one text frame. Malformed input is logged and yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(command) => Some(command),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed client message");
                None
            }
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Get { .. } => "get",
            ClientCommand::Set { .. } => "set",
            ClientCommand::Render { .. } => "render",
            ClientCommand::Activate => "activate",
            ClientCommand::Deactivate => "deactivate",
            ClientCommand::Call { .. } => "call",
        }
    }
}

/// The stored form of a `set` value.
///
/// Strings are kept as-is, numbers and booleans are stringified. Missing,
/// null and empty values are rejected.
pub fn setting_value(path: &str, value: Option<&Value>) -> Result<String, CommandError> {
    let invalid = |reason: &str| CommandError::Validation {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    match value {
        None | Some(Value::Null) => Err(invalid("a value is required")),
        Some(Value::String(s)) if s.is_empty() => Err(invalid("value must not be empty")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
        Some(_) => Err(invalid("value must be a string, number or boolean")),
    }
}
