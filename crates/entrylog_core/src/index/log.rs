//! Durable index backed by RocksDB under `<log root>/index`.
//!
//! Each position is one key (see the module-level key format). A batch is a
//! single `WriteBatch`, so it lands entirely or not at all. Deleting a
//! segment is one range tombstone over the segment's keys. `flush` issues
//! an empty synced write, which forces every earlier unsynced write to
//! stable storage.

use super::{decode_value, encode_key, encode_value, segment_range, EntryIndex, IndexValue};
use crate::config::IndexConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::{FileLocation, Position};
use async_trait::async_trait;
use parking_lot::RwLock;
use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the index subdirectory under a log root.
pub const INDEX_DIR: &str = "index";

const SST_SIZE_PROPERTY: &str = "rocksdb.total-sst-files-size";

/// The durable position index of one entry log.
///
/// The database handle is dropped on `close`, which releases its lock file
/// so the same root can be reopened in-process.
pub struct LogIndex {
    dir: PathBuf,
    config: IndexConfig,
    db: RwLock<Option<DB>>,
}

impl std::fmt::Debug for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogIndex")
            .field("dir", &self.dir)
            .field("sync_on_write", &self.config.sync_on_write)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl LogIndex {
    /// Opens or creates the index under `<log_root>/index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or RocksDB
    /// refuses to open it (corrupt files, lock held by another handle).
    pub fn open(log_root: &Path, config: IndexConfig) -> CoreResult<Self> {
        let dir = log_root.join(INDEX_DIR);
        fs::create_dir_all(&dir)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, &dir)?;

        tracing::info!(dir = %dir.display(), "index opened");
        Ok(Self {
            dir,
            config,
            db: RwLock::new(Some(db)),
        })
    }

    /// Returns the index directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the total size of the index's SST files in bytes.
    ///
    /// Unflushed memtable contents are not counted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexClosed`] after `close`, or the RocksDB
    /// error if the property cannot be read.
    pub fn sst_bytes(&self) -> CoreResult<u64> {
        self.with_db(|db| Ok(db.property_int_value(SST_SIZE_PROPERTY)?.unwrap_or(0)))
    }

    fn with_db<T>(&self, op: impl FnOnce(&DB) -> CoreResult<T>) -> CoreResult<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(CoreError::IndexClosed)?;
        op(db)
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_on_write);
        opts
    }

    fn write(&self, batch: WriteBatch) -> CoreResult<()> {
        let opts = self.write_options();
        self.with_db(|db| Ok(db.write_opt(batch, &opts)?))
    }
}

/// Synced empty write: a durability barrier for everything written before.
fn sync_barrier(db: &DB) -> CoreResult<()> {
    let mut opts = WriteOptions::default();
    opts.set_sync(true);
    db.write_opt(WriteBatch::default(), &opts)?;
    Ok(())
}

#[async_trait]
impl EntryIndex for LogIndex {
    async fn add(&self, position: Position, location: FileLocation) -> CoreResult<()> {
        let mut batch = WriteBatch::default();
        batch.put(encode_key(position), encode_value(location));
        self.write(batch)
    }

    async fn add_batch(&self, entries: &[(Position, FileLocation)]) -> CoreResult<()> {
        let mut batch = WriteBatch::default();
        for (position, location) in entries {
            batch.put(encode_key(*position), encode_value(*location));
        }
        self.write(batch)
    }

    async fn get(&self, position: Position) -> CoreResult<Option<FileLocation>> {
        let raw = self.with_db(|db| Ok(db.get(encode_key(position))?))?;
        raw.map(|bytes| {
            let value: IndexValue = bytes.as_slice().try_into().map_err(|_| {
                CoreError::invalid_format(format!(
                    "index value for {position} is {} bytes",
                    bytes.len()
                ))
            })?;
            Ok(decode_value(&value))
        })
        .transpose()
    }

    async fn delete(&self, segment_id: i64) -> CoreResult<()> {
        let (start, last) = segment_range(segment_id);
        // Range tombstones exclude their end key; `last` plus one byte sorts
        // after every 12-byte key of the segment and before the next segment.
        let mut end = last.to_vec();
        end.push(0);

        let mut batch = WriteBatch::default();
        batch.delete_range(start.as_slice(), end.as_slice());
        self.write(batch)?;
        tracing::debug!(segment_id, "deleted segment from index");
        Ok(())
    }

    async fn flush(&self) -> CoreResult<()> {
        self.with_db(sync_barrier)
    }

    async fn compact(&self) -> CoreResult<()> {
        self.with_db(|db| {
            db.compact_range(None::<&[u8]>, None::<&[u8]>);
            Ok(())
        })?;
        tracing::info!(dir = %self.dir.display(), "index compacted");
        Ok(())
    }

    async fn close(&self) -> CoreResult<()> {
        let mut guard = self.db.write();
        let Some(db) = guard.as_ref() else {
            return Ok(());
        };
        sync_barrier(db)?;
        guard.take();
        tracing::debug!(dir = %self.dir.display(), "index closed");
        Ok(())
    }

    fn count(&self) -> usize {
        self.db.read().as_ref().map_or(0, |db| {
            db.iterator(IteratorMode::Start)
                .take_while(Result::is_ok)
                .count()
        })
    }

    fn is_closed(&self) -> bool {
        self.db.read().is_none()
    }
}
