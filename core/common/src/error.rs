//! Common error types for TaskVault.

use thiserror::Error;

/// Top-level error type for TaskVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any transaction opened.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation targeted a nonexistent record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage-layer failure mid-commit; the attempted mutation did not happen.
    #[error("Transaction aborted: {0}")]
    TransactionAbort(String),

    /// Network or remote-conflict failure during a drain pass.
    #[error("Sync failure: {0}")]
    Sync(String),

    /// Persistent storage is full; surfaced as a blocking condition.
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transport-level failure talking to the remote.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A channel endpoint was closed or a receiver lagged.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Neither cache nor network could produce the requested resource.
    #[error("Resource unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Whether this error is a transient transport fault worth retrying.
    ///
    /// Validation and not-found errors indicate a caller bug or a stale
    /// reference and must never be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_retryable() {
        assert!(Error::Network("timeout".to_string()).is_retryable());
    }

    #[test]
    fn local_errors_are_not_retryable() {
        assert!(!Error::Validation("empty title".to_string()).is_retryable());
        assert!(!Error::NotFound("task-1".to_string()).is_retryable());
        assert!(!Error::QuotaExceeded("disk full".to_string()).is_retryable());
    }
}
