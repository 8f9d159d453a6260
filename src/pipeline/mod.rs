//! Processing pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! capture → color conversion → viewport crop → lane detection → controller
//!    (frame handed element to element; elements publish named payloads)
//! ```
//!
//! The background runner only sees the [`Pipeline`] trait: one call to
//! `process` is one iteration and yields the payloads to broadcast.
//!
//! # Design Decisions
//! - Elements declare their settings explicitly through [`ChainElement::settings`]
//! - Element callbacks are reachable from clients by `element.name`
//! - The platform chain is chosen once at startup; an unknown platform is fatal

pub mod callbacks;
pub mod chain;
pub mod elements;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::settings::SettingsError;

pub use callbacks::{Callback, CallbackError, CallbackRegistry};
pub use chain::{ChainElement, ElementContext, ProcessingChain};

/// One iteration of work driven by the background runner.
pub trait Pipeline: Send {
    fn process(&mut self) -> Result<PipelineOutput, PipelineError>;
}

/// Errors raised while assembling or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No chain exists for the requested platform.
    #[error("platform '{0}' is not supported")]
    UnsupportedPlatform(String),

    /// An element's settings could not be attached.
    #[error("failed to register element '{element}': {source}")]
    Registration {
        element: String,
        #[source]
        source: SettingsError,
    },

    /// A setting holds a value the element cannot use.
    #[error("setting '{path}' has unusable value '{value}'")]
    InvalidSetting { path: String, value: String },

    /// An element failed during an iteration.
    #[error("element '{element}' failed: {reason}")]
    Element { element: String, reason: String },
}

/// Image data handed from element to element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major, one byte per pixel.
    pub pixels: Vec<u8>,
    pub steering_angle: Option<f64>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
            steering_angle: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// A named result of one iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub name: String,
    pub data: Value,
}

/// Everything one iteration wants published.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    payloads: Vec<Payload>,
}

impl PipelineOutput {
    pub fn publish(&mut self, name: impl Into<String>, data: Value) {
        self.payloads.push(Payload {
            name: name.into(),
            data,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }
}

impl IntoIterator for PipelineOutput {
    type Item = Payload;
    type IntoIter = std::vec::IntoIter<Payload>;

    fn into_iter(self) -> Self::IntoIter {
        self.payloads.into_iter()
    }
}
