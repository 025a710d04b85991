//! # EntryLog Testkit
//!
//! Test utilities for EntryLog.
//!
//! This crate provides:
//! - Fixtures for temp-dir and in-memory logs and directories
//! - A multi-segment [`LedgerView`](entrylog_core::LedgerView) for cursor tests
//! - Property-based test generators using proptest
//! - Concurrent append stress runners with read-back verification
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entrylog_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_log() {
//!     let log = TestLog::file(StorageConfig::default()).await;
//!     log.add_entry(Position::new(0, 0), Bytes::from_static(b"x")).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod ledger;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::ledger::*;
    pub use crate::stress::*;
    pub use bytes::Bytes;
    pub use entrylog_core::{Cursor, ManagedCursor, Position, StorageConfig};
}

pub use fixtures::*;
pub use generators::*;
pub use ledger::*;
pub use stress::*;
