//! Common types shared across TaskVault crates.

pub mod error;
pub mod sanitize;
pub mod types;

pub use error::{Error, Result};
pub use sanitize::{sanitize_tags, sanitize_text};
pub use types::{CategoryId, ContextId, OperationId, TaskId, SYNC_TAG};
