//! # qcsync Core
//!
//! Local side of the qcsync engine.
//!
//! This crate provides:
//! - Statement registry (named SQL templates)
//! - Single-writer transaction guard over a statement executor
//! - Mutation outbox recording every successful write
//! - Watermark persistence for sync rounds
//!
//! ## Architecture
//!
//! The store never talks to a database directly. It drives a
//! [`StatementExecutor`], which runs SQL text and provides one
//! non-nested transaction at a time. [`MemoryExecutor`] is used by tests;
//! `SqliteExecutor` (feature `sqlite`) is the production executor.
//!
//! ## Key Invariants
//!
//! - An outbox record exists iff its write committed
//! - Outbox order matches commit order
//! - Statement executions from two write sequences never interleave
//! - Queries are never recorded

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod executor;
mod memory;
mod outbox;
mod registry;
pub mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;
mod store;
mod transaction;

pub use error::{CoreError, CoreResult};
pub use executor::{QueryResult, StatementExecutor};
pub use memory::{JournalEntry, MemoryExecutor, TraceEvent};
pub use outbox::OutboxRecord;
pub use registry::StatementRegistry;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteExecutor;
pub use store::LocalStore;
pub use transaction::{SyncTransaction, Transaction};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
