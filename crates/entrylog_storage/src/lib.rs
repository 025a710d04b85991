//! # EntryLog Storage
//!
//! Storage backend traits and implementations for EntryLog.
//!
//! This crate provides the lowest-level storage abstraction for EntryLog.
//! Storage backends are **opaque byte stores** - they do not interpret
//! the data they store.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (positional read/write, append, sync)
//! - No knowledge of entry framing, file headers, or index records
//! - Must be `Send + Sync` for concurrent access
//! - EntryLog owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Providers
//!
//! A [`BackendProvider`] owns a namespace of numbered backends (one storage
//! root). Entry log directories are built on top of a provider so the same
//! code runs against real files or memory.
//!
//! - [`InMemoryBackendProvider`] - Shared in-memory files, survives "reopen"
//! - [`FileBackendProvider`] - One file per id, named by its decimal id
//!
//! ## Example
//!
//! ```rust
//! use entrylog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.write_at(0, b"hello world").unwrap();
//! let data = backend.read_at(6, 5).unwrap();
//! assert_eq!(&data, b"world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod provider;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use provider::{
    BackendProvider, FileBackendProvider, InMemoryBackendProvider, OpenedBackend,
};
