//! Entry logger: a directory of entry files plus its position index.

use crate::config::{IndexConfig, StorageConfig};
use crate::directory::Directory;
use crate::error::{CoreError, CoreResult};
use crate::index::{EntryIndex, LogIndex};
use crate::types::{Entry, FileLocation, Position};
use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Appends entries by position and reads them back through the index.
///
/// # Example
///
/// ```rust,ignore
/// let logger = EntryLogger::open(Path::new("log"), StorageConfig::default(), IndexConfig::default()).await?;
/// logger.add_entry(Position::new(1, 0), Bytes::from_static(b"hello")).await?;
/// let entry = logger.read_entry(Position::new(1, 0)).await?;
/// ```
pub struct EntryLogger {
    directory: Arc<Directory>,
    index: Arc<dyn EntryIndex>,
}

impl fmt::Debug for EntryLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryLogger")
            .field("directory", &self.directory)
            .field("indexed", &self.index.count())
            .finish()
    }
}

impl EntryLogger {
    /// Joins an existing directory and index.
    #[must_use]
    pub fn new(directory: Arc<Directory>, index: Arc<dyn EntryIndex>) -> Self {
        Self { directory, index }
    }

    /// Opens the log rooted at `root`: entry files in `root`, the index in
    /// `root/index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be opened or the directory
    /// cannot be recovered.
    pub async fn open(
        root: &Path,
        storage: StorageConfig,
        index: IndexConfig,
    ) -> CoreResult<Self> {
        let index = LogIndex::open(root, index)?;
        let directory = Directory::open(root, storage);
        directory.initialize().await?;
        Ok(Self::new(directory, Arc::new(index)))
    }

    /// Returns the entry file directory.
    #[must_use]
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Returns the position index.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn EntryIndex> {
        &self.index
    }

    /// Appends `data` and indexes it under `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the append or the index write fails.
    pub async fn add_entry(&self, position: Position, data: Bytes) -> CoreResult<FileLocation> {
        let location = self.directory.add(data).await?;
        self.index.add(position, location).await?;
        Ok(location)
    }

    /// Appends several entries and indexes them as one batch.
    ///
    /// # Errors
    ///
    /// Returns the first append error, or the index write error.
    pub async fn add_entries(
        &self,
        entries: Vec<(Position, Bytes)>,
    ) -> CoreResult<Vec<FileLocation>> {
        let mut mapped = Vec::with_capacity(entries.len());
        for (position, data) in entries {
            let location = self.directory.add(data).await?;
            mapped.push((position, location));
        }
        self.index.add_batch(&mapped).await?;
        Ok(mapped.into_iter().map(|(_, location)| location).collect())
    }

    /// Reads the entry indexed under `position`.
    ///
    /// # Errors
    ///
    /// Returns `PositionNotFound` if nothing is indexed there, or the
    /// directory's read error.
    pub async fn read_entry(&self, position: Position) -> CoreResult<Entry> {
        let location = self
            .index
            .get(position)
            .await?
            .ok_or(CoreError::PositionNotFound { position })?;
        let data = self.directory.read_entry(location).await?;
        Ok(Entry::new(position, data))
    }

    /// Forgets every position of `segment_id`. Entry bytes stay in their
    /// files until those are deleted.
    ///
    /// # Errors
    ///
    /// Returns the index error.
    pub async fn delete_segment(&self, segment_id: i64) -> CoreResult<()> {
        self.index.delete(segment_id).await?;
        tracing::info!(segment_id, "segment deleted");
        Ok(())
    }

    /// Flushes entry files, then the index.
    ///
    /// # Errors
    ///
    /// Returns `Fenced` after close, or the index flush error.
    pub async fn flush(&self) -> CoreResult<()> {
        self.directory.flush().await?;
        self.index.flush().await
    }

    /// Compacts the index.
    ///
    /// # Errors
    ///
    /// Returns the compaction error.
    pub async fn compact_index(&self) -> CoreResult<()> {
        self.index.compact().await
    }

    /// Closes the directory, then the index.
    ///
    /// # Errors
    ///
    /// Returns the index close error.
    pub async fn close(&self) -> CoreResult<()> {
        self.directory.close().await?;
        self.index.close().await
    }
}
