//! Error types for qcsync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No statement is registered under this name.
    #[error("unknown statement: {name}")]
    UnknownStatement {
        /// The name that was looked up.
        name: String,
    },

    /// The statement executor reported a failure.
    #[error("storage error: {message}")]
    Storage {
        /// Executor-supplied description.
        message: String,
    },

    /// SQLite error.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Arguments could not be serialized, or stored arguments could not be read back.
    #[error("codec error: {0}")]
    Codec(#[from] qcsync_codec::CodecError),

    /// Commit was requested for a transaction in which a statement failed.
    /// The transaction has been rolled back.
    #[error("transaction rolled back: {reason}")]
    TransactionFailed {
        /// The first failure observed inside the transaction.
        reason: String,
    },

    /// The calling thread already holds the open transaction.
    #[error("a transaction is already open on this thread")]
    TransactionActive,

    /// A row in the sync tables does not have the expected layout.
    #[error("corrupted sync table: {message}")]
    Corrupted {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown statement error.
    pub fn unknown_statement(name: impl Into<String>) -> Self {
        Self::UnknownStatement { name: name.into() }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a transaction failed error.
    pub fn transaction_failed(reason: impl Into<String>) -> Self {
        Self::TransactionFailed {
            reason: reason.into(),
        }
    }

    /// Creates a corrupted table error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Returns true if this is a caller error about an unregistered name.
    pub fn is_unknown_statement(&self) -> bool {
        matches!(self, CoreError::UnknownStatement { .. })
    }
}
