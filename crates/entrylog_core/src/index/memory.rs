//! In-memory index for tests.

use super::{ensure_open, EntryIndex};
use crate::error::CoreResult;
use crate::types::{FileLocation, Position};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An index that keeps everything in memory. Nothing survives a drop.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    map: RwLock<BTreeMap<Position, FileLocation>>,
    closed: AtomicBool,
}

impl MemoryIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryIndex for MemoryIndex {
    async fn add(&self, position: Position, location: FileLocation) -> CoreResult<()> {
        ensure_open(self.is_closed())?;
        self.map.write().insert(position, location);
        Ok(())
    }

    async fn add_batch(&self, entries: &[(Position, FileLocation)]) -> CoreResult<()> {
        ensure_open(self.is_closed())?;
        self.map.write().extend(entries.iter().copied());
        Ok(())
    }

    async fn get(&self, position: Position) -> CoreResult<Option<FileLocation>> {
        ensure_open(self.is_closed())?;
        Ok(self.map.read().get(&position).copied())
    }

    async fn delete(&self, segment_id: i64) -> CoreResult<()> {
        ensure_open(self.is_closed())?;
        let start = Position::new(segment_id, i32::MIN);
        let end = Position::new(segment_id, i32::MAX);
        let mut map = self.map.write();
        let doomed: Vec<Position> = map.range(start..=end).map(|(p, _)| *p).collect();
        for position in doomed {
            map.remove(&position);
        }
        Ok(())
    }

    async fn flush(&self) -> CoreResult<()> {
        ensure_open(self.is_closed())
    }

    async fn compact(&self) -> CoreResult<()> {
        ensure_open(self.is_closed())
    }

    async fn close(&self) -> CoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn count(&self) -> usize {
        self.map.read().len()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
