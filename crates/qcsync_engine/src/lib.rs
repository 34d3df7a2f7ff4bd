//! # qcsync Engine
//!
//! Sync coordinator for qcsync.
//!
//! This crate provides:
//! - Sync state machine (idle → authenticating → pushing → awaiting
//!   response → applying remote → committing watermark)
//! - Session tracking with one re-authentication per round
//! - Retry with exponential backoff
//! - Form-over-HTTP transport abstraction
//! - Offloading rounds from async runtimes
//!
//! ## Architecture
//!
//! A round is **push-then-apply inside one local transaction**:
//! 1. Read the watermark and the outbox, encode the envelope
//! 2. Post it and wait (bounded by the configured timeout)
//! 3. Replay the remote mutations in response order
//! 4. Store the new watermark and clear the outbox
//! 5. Commit
//!
//! Any failure in steps 1-4 rolls the transaction back.
//!
//! ## Key Invariants
//!
//! - The remote side is authoritative
//! - A watermark is stored only after every mutation it covers applied
//! - The stored watermark never moves backwards
//! - The outbox is cleared only in a round that commits

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod envelope;
mod error;
mod http;
mod runtime;
mod session;
mod state;
mod transport;

pub use config::{Credentials, RetryConfig, SyncConfig, DEFAULT_SUCCESS_MARKER};
pub use envelope::{outbound_envelope, stored_watermark};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpError, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer};
pub use session::Session;
pub use state::{StateObserver, SyncCoordinator, SyncReport, SyncState, SyncStats};
pub use transport::{MockTransport, SyncTransport};
