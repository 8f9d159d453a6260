//! Settings subsystem.
//!
//! # Data Flow
//! ```text
//! chain elements (at registration)
//!     → node.rs (subtree attached under root, fqids recomputed)
//!     → store.rs load (settings.json → fill_from_flat)
//!
//! client `get`/`set`
//!     → store.rs (lock, resolve, read/write)
//!     → store.rs dump (flatten, merge over file, write back)
//!
//! settings page
//!     → widgets.rs (render root, skip nodes without a widget)
//! ```

pub mod error;
pub mod node;
pub mod store;
pub mod widgets;

pub use error::{SettingsError, SettingsResult};
pub use node::{SettingsNode, ROOT_NODE_NAME};
pub use store::SettingsStore;
pub use widgets::{OptionWidget, SelectWidget, SubtreeWidget, TextWidget, Widget};
