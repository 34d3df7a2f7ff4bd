//! # qcsync Protocol
//!
//! Wire messages for qcsync.
//!
//! This crate provides:
//! - Form requests for `login`, `sync` and `logout`
//! - `SyncEnvelope`, the outbound push of pending writes
//! - `SyncResponse` and `LoginResponse` with strict shape validation
//! - `Watermark`, the ordered last-sync marker
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod messages;
mod watermark;

pub use envelope::{SyncEnvelope, SyncItem};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    Command, FormFields, LoginRequest, LoginResponse, LogoutRequest, RemoteMutation, RemoteUpdate,
    SyncRequest, SyncResponse,
};
pub use watermark::Watermark;
