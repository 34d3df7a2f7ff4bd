//! CLI command implementations.

pub mod clear_outbox;
pub mod inspect;
pub mod pending;

use qcsync_core::{CoreError, LocalStore, SqliteExecutor};
use qcsync_engine::SyncError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No database file at the given path.
    #[error("no store found at {}", .0.display())]
    NoStore(PathBuf),
    /// Unknown `--format` value.
    #[error("unknown output format '{0}' (expected text or json)")]
    UnknownFormat(String),
    /// The command needs confirmation.
    #[error("{0}")]
    Refused(String),
    /// Local store failure.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// Envelope construction failure.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// JSON output failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output format of read-only commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// One JSON document.
    Json,
}

impl Format {
    /// Parses `text` or `json`.
    pub fn parse(name: &str) -> Result<Self, CliError> {
        match name {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

/// Opens an existing SQLite store.
pub fn open_store(path: &Path) -> Result<LocalStore<SqliteExecutor>, CliError> {
    if !path.exists() {
        return Err(CliError::NoStore(path.to_path_buf()));
    }
    Ok(LocalStore::open(SqliteExecutor::open(path)?)?)
}
