//! Error types for the sync engine.

use qcsync_core::CoreError;
use qcsync_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync coordinator.
///
/// Every failed operation reports exactly one of these kinds, and any
/// transaction it had open has already been rolled back.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A statement name used locally or sent by the remote side is not registered.
    #[error("unknown statement: {name}")]
    UnknownStatement {
        /// The unregistered name.
        name: String,
    },

    /// The local store failed.
    #[error("local storage error: {0}")]
    LocalStorage(CoreError),

    /// Login was refused, or the remote side rejected the session.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Network or transport error, including timeouts.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the round can be retried as-is.
        retryable: bool,
    },

    /// A response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote side reported that the round failed.
    #[error("server sync error: {0}")]
    ServerSync(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates the error for a remote call that missed its deadline.
    pub fn timeout(after: Duration) -> Self {
        Self::transport_retryable(format!("no response within {after:?}"))
    }

    /// Returns true if the round can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { retryable: true, .. })
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownStatement { name } => Self::UnknownStatement { name },
            other => Self::LocalStorage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_retry() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(SyncError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(!SyncError::transport_fatal("HTTP 404").is_retryable());
        assert!(!SyncError::AuthenticationFailed("bad password".into()).is_retryable());
        assert!(!SyncError::ServerSync("db locked".into()).is_retryable());
        assert!(!SyncError::from(ProtocolError::shape("x")).is_retryable());
    }

    #[test]
    fn unknown_statement_keeps_its_kind() {
        let err = SyncError::from(CoreError::unknown_statement("addItem"));
        assert!(matches!(err, SyncError::UnknownStatement { ref name } if name == "addItem"));

        let err = SyncError::from(CoreError::storage("disk full"));
        assert!(matches!(err, SyncError::LocalStorage(_)));
        assert_eq!(err.to_string(), "local storage error: storage error: disk full");
    }
}
