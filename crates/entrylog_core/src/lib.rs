//! # EntryLog Core
//!
//! Segmented append-only entry log for EntryLog.
//!
//! This crate provides:
//! - [`EntryFile`] - One buffered append-only file with crash recovery
//! - [`Directory`] - A rolling set of entry files under one root
//! - [`EntryIndex`] - Durable position index ([`LogIndex`], [`MemoryIndex`])
//! - [`Cursor`] - Per-consumer acknowledgment tracking ([`ManagedCursor`])
//! - [`EntryLogger`] - Directory and index joined behind position-addressed reads
//!
//! Every entry file and directory follows one lifecycle:
//! `New -> Initializing -> Initialized | InitializeFailed`, then `Fenced`
//! on close.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod cursor;
mod directory;
mod entry_file;
mod error;
pub mod index;
mod logger;
mod state;
mod types;

pub use config::{IndexConfig, StorageConfig};
pub use cursor::{Cursor, CursorSnapshot, LedgerView, ManagedCursor};
pub use directory::{Directory, IdGenerator};
pub use entry_file::{AddOutcome, EntryFile, FileHeader, FRAME_PREFIX_SIZE, HEADER_SIZE, MAGIC};
pub use error::{CoreError, CoreResult};
pub use index::{EntryIndex, LogIndex, MemoryIndex};
pub use logger::EntryLogger;
pub use state::LifecycleState;
pub use types::{Entry, FileLocation, Position};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
