//! Test fixtures for logs and directories.
//!
//! File-backed fixtures keep their temporary directory alive for as long
//! as the fixture lives.

use entrylog_core::{Directory, EntryLogger, IndexConfig, MemoryIndex, StorageConfig};
use entrylog_storage::InMemoryBackendProvider;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A logger with automatic cleanup.
pub struct TestLog {
    /// The logger instance.
    pub logger: EntryLogger,
    temp_dir: Option<TempDir>,
    provider: Option<Arc<InMemoryBackendProvider>>,
}

impl TestLog {
    /// Creates a logger over in-memory files and an in-memory index.
    pub async fn memory(config: StorageConfig) -> Self {
        let provider = Arc::new(InMemoryBackendProvider::new());
        let directory = Directory::new(provider.clone(), config);
        directory
            .initialize()
            .await
            .expect("Failed to initialize in-memory directory");
        Self {
            logger: EntryLogger::new(directory, Arc::new(MemoryIndex::new())),
            temp_dir: None,
            provider: Some(provider),
        }
    }

    /// Creates a logger in a fresh temporary directory.
    pub async fn file(config: StorageConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let logger = EntryLogger::open(temp_dir.path(), config, IndexConfig::default())
            .await
            .expect("Failed to open file log");
        Self {
            logger,
            temp_dir: Some(temp_dir),
            provider: None,
        }
    }

    /// Closes the logger and opens a new one over the same files.
    ///
    /// # Panics
    ///
    /// Panics for in-memory logs, whose index does not survive a reopen.
    pub async fn reopen(self, config: StorageConfig) -> Self {
        let temp_dir = self
            .temp_dir
            .expect("Only file-based logs can be reopened");
        self.logger.close().await.expect("Failed to close log");
        let logger = EntryLogger::open(temp_dir.path(), config, IndexConfig::default())
            .await
            .expect("Failed to reopen file log");
        Self {
            logger,
            temp_dir: Some(temp_dir),
            provider: None,
        }
    }

    /// Returns the log root if file-based.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Returns the in-memory provider if memory-based.
    pub fn provider(&self) -> Option<&Arc<InMemoryBackendProvider>> {
        self.provider.as_ref()
    }
}

impl std::ops::Deref for TestLog {
    type Target = EntryLogger;

    fn deref(&self) -> &Self::Target {
        &self.logger
    }
}

/// An initialized in-memory directory together with its provider.
pub async fn memory_directory(
    config: StorageConfig,
) -> (Arc<Directory>, Arc<InMemoryBackendProvider>) {
    let provider = Arc::new(InMemoryBackendProvider::new());
    let directory = Directory::new(provider.clone(), config);
    directory
        .initialize()
        .await
        .expect("Failed to initialize in-memory directory");
    (directory, provider)
}

/// Storage config with a small file threshold so tests roll over quickly.
pub fn small_files(threshold: u64) -> StorageConfig {
    StorageConfig::new().max_entry_file_size(threshold)
}
