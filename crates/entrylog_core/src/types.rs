//! Core type definitions for EntryLog.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of one log entry: a segment id and an entry id within it.
///
/// Positions are totally ordered by segment id, then entry id. The derived
/// `Ord` relies on the field order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// The segment (ledger) this entry belongs to.
    pub segment_id: i64,
    /// The entry id within the segment.
    pub entry_id: i32,
}

impl Position {
    /// Sorts before every real position.
    pub const EARLIEST: Self = Self::new(-1, -1);

    /// Sorts after every real position.
    pub const LATEST: Self = Self::new(i64::MAX, i32::MAX);

    /// Creates a new position.
    #[must_use]
    pub const fn new(segment_id: i64, entry_id: i32) -> Self {
        Self {
            segment_id,
            entry_id,
        }
    }

    /// Returns the successor within the same segment.
    ///
    /// A negative entry id steps to 0. Moving to the next segment is the
    /// owning ledger's job, not the position's.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.entry_id < 0 {
            Self::new(self.segment_id, 0)
        } else {
            Self::new(self.segment_id, self.entry_id.saturating_add(1))
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.segment_id, self.entry_id)
    }
}

/// Physical location of an entry: the file id and the frame offset in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileLocation {
    /// Id of the entry file.
    pub file_id: u64,
    /// Offset of the entry's length prefix within the file.
    pub offset: u32,
}

impl FileLocation {
    /// Creates a new file location.
    #[must_use]
    pub const fn new(file_id: u64, offset: u32) -> Self {
        Self { file_id, offset }
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}@{}", self.file_id, self.offset)
    }
}

/// An entry read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Where the entry lives in the logical log.
    pub position: Position,
    /// The payload, as an independently owned buffer.
    pub data: Bytes,
}

impl Entry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(position: Position, data: Bytes) -> Self {
        Self { position, data }
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
