//! Position index: durable mapping from [`Position`] to [`FileLocation`].
//!
//! ## Key Format
//!
//! ```text
//! | segment_id (8, big-endian, sign bit flipped) | entry_id (4, big-endian, sign bit flipped) |
//! ```
//!
//! Flipping the sign bit makes unsigned byte order match `Position` order,
//! negative ids included, so a segment's keys form one contiguous range.
//!
//! ## Value Format
//!
//! ```text
//! | file_id (8, big-endian) | offset (4, big-endian) |
//! ```
//!
//! ## Implementations
//!
//! - [`LogIndex`] - RocksDB under the log's `index` directory
//! - [`MemoryIndex`] - In-memory, for tests

mod log;
mod memory;

pub use log::{LogIndex, INDEX_DIR};
pub use memory::MemoryIndex;

use crate::error::{CoreError, CoreResult};
use crate::types::{FileLocation, Position};
use async_trait::async_trait;

/// Encoded key size.
pub const KEY_SIZE: usize = 12;

/// Encoded value size.
pub const VALUE_SIZE: usize = 12;

/// An encoded index key.
pub type IndexKey = [u8; KEY_SIZE];

/// An encoded index value.
pub type IndexValue = [u8; VALUE_SIZE];

const SEGMENT_SIGN: u64 = 1 << 63;
const ENTRY_SIGN: u32 = 1 << 31;

/// Encodes a position as an order-preserving key.
#[must_use]
pub fn encode_key(position: Position) -> IndexKey {
    let mut key = [0u8; KEY_SIZE];
    key[0..8].copy_from_slice(&((position.segment_id as u64) ^ SEGMENT_SIGN).to_be_bytes());
    key[8..12].copy_from_slice(&((position.entry_id as u32) ^ ENTRY_SIGN).to_be_bytes());
    key
}

/// Decodes a key produced by [`encode_key`].
#[must_use]
pub fn decode_key(key: &IndexKey) -> Position {
    let mut segment = [0u8; 8];
    segment.copy_from_slice(&key[0..8]);
    let mut entry = [0u8; 4];
    entry.copy_from_slice(&key[8..12]);
    Position::new(
        (u64::from_be_bytes(segment) ^ SEGMENT_SIGN) as i64,
        (u32::from_be_bytes(entry) ^ ENTRY_SIGN) as i32,
    )
}

/// Encodes a file location as an index value.
#[must_use]
pub fn encode_value(location: FileLocation) -> IndexValue {
    let mut value = [0u8; VALUE_SIZE];
    value[0..8].copy_from_slice(&location.file_id.to_be_bytes());
    value[8..12].copy_from_slice(&location.offset.to_be_bytes());
    value
}

/// Decodes a value produced by [`encode_value`].
#[must_use]
pub fn decode_value(value: &IndexValue) -> FileLocation {
    let mut file_id = [0u8; 8];
    file_id.copy_from_slice(&value[0..8]);
    let mut offset = [0u8; 4];
    offset.copy_from_slice(&value[8..12]);
    FileLocation::new(u64::from_be_bytes(file_id), u32::from_be_bytes(offset))
}

/// Inclusive key range covering every entry id of `segment_id`.
#[must_use]
pub fn segment_range(segment_id: i64) -> (IndexKey, IndexKey) {
    (
        encode_key(Position::new(segment_id, i32::MIN)),
        encode_key(Position::new(segment_id, i32::MAX)),
    )
}

/// A sorted, durable map from positions to file locations.
///
/// # Invariants
///
/// - `get` after `add` returns the added location until the segment is deleted
/// - `add_batch` is applied entirely or not at all
/// - After `delete(s)`, `get` returns `None` for every position of segment `s`
/// - Every operation after `close` fails with [`CoreError::IndexClosed`]
#[async_trait]
pub trait EntryIndex: Send + Sync {
    /// Maps one position to its location.
    async fn add(&self, position: Position, location: FileLocation) -> CoreResult<()>;

    /// Maps several positions atomically.
    async fn add_batch(&self, entries: &[(Position, FileLocation)]) -> CoreResult<()>;

    /// Looks up a position. `None` is a valid outcome.
    async fn get(&self, position: Position) -> CoreResult<Option<FileLocation>>;

    /// Removes every position of `segment_id`.
    async fn delete(&self, segment_id: i64) -> CoreResult<()>;

    /// Makes every prior write durable.
    async fn flush(&self) -> CoreResult<()>;

    /// Reclaims space left by deletes and overwrites.
    async fn compact(&self) -> CoreResult<()>;

    /// Flushes and closes the index. Later calls are no-ops.
    async fn close(&self) -> CoreResult<()>;

    /// Number of live keys.
    fn count(&self) -> usize;

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

pub(crate) fn ensure_open(closed: bool) -> CoreResult<()> {
    if closed {
        Err(CoreError::IndexClosed)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_layout_for_non_negative_positions() {
        let key = encode_key(Position::new(1, 2));
        assert_eq!(key, [0x80, 0, 0, 0, 0, 0, 0, 1, 0x80, 0, 0, 2]);
    }

    #[test]
    fn sentinels_bound_every_key() {
        let earliest = encode_key(Position::EARLIEST);
        let latest = encode_key(Position::LATEST);
        assert!(earliest < encode_key(Position::new(0, 0)));
        assert!(encode_key(Position::new(i64::MAX, 0)) < latest);
        assert_eq!(decode_key(&earliest), Position::EARLIEST);
        assert_eq!(decode_key(&latest), Position::LATEST);
    }

    #[test]
    fn value_layout() {
        let value = encode_value(FileLocation::new(3, 1040));
        assert_eq!(value, [0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0x04, 0x10]);
        assert_eq!(decode_value(&value), FileLocation::new(3, 1040));
    }

    #[test]
    fn segment_range_contains_only_that_segment() {
        let (start, end) = segment_range(5);
        for entry in [i32::MIN, -1, 0, 7, i32::MAX] {
            let key = encode_key(Position::new(5, entry));
            assert!(start <= key && key <= end);
        }
        assert!(encode_key(Position::new(4, i32::MAX)) < start);
        assert!(encode_key(Position::new(6, i32::MIN)) > end);
    }

    proptest! {
        #[test]
        fn key_order_matches_position_order(
            a in (any::<i64>(), any::<i32>()),
            b in (any::<i64>(), any::<i32>()),
        ) {
            let pa = Position::new(a.0, a.1);
            let pb = Position::new(b.0, b.1);
            prop_assert_eq!(pa.cmp(&pb), encode_key(pa).cmp(&encode_key(pb)));
            prop_assert_eq!(decode_key(&encode_key(pa)), pa);
        }
    }
}
