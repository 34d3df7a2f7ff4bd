//! # qcsync Testkit
//!
//! Test utilities for qcsync.
//!
//! This crate provides:
//! - Store fixtures with a standard statement set
//! - Canned wire responses, valid and malformed
//! - A scriptable fake remote service
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qcsync_testkit::prelude::*;
//!
//! #[test]
//! fn writes_reach_the_server() {
//!     let fixture = MemoryStore::new();
//!     fixture.store.set_data(ADD_ITEM, &["x".into()]).unwrap();
//!     // ... run a sync round against FakeSyncServer
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod responses;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::responses::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use responses::*;
pub use server::*;
