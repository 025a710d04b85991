//! A growable multi-segment ledger for cursor tests.

use entrylog_core::{LedgerView, Position};
use parking_lot::RwLock;

/// Segment ids with their entry counts, ascending by id.
#[derive(Debug, Default)]
struct SegmentTable(Vec<(i64, i32)>);

impl SegmentTable {
    /// Number of positions at or before `position`.
    fn count_through(&self, position: Position) -> u64 {
        self.0
            .iter()
            .map(|&(segment, len)| {
                if segment < position.segment_id {
                    len as u64
                } else if segment == position.segment_id {
                    (i64::from(position.entry_id) + 1).clamp(0, i64::from(len)) as u64
                } else {
                    0
                }
            })
            .sum()
    }
}

/// A ledger of consecutive segments, each holding entries `0..len`.
///
/// Segments are appended in ascending id order and may be empty; empty
/// segments hold no positions.
#[derive(Debug, Default)]
pub struct SequentialLedger {
    segments: RwLock<SegmentTable>,
}

impl SequentialLedger {
    /// Creates a ledger from `(segment_id, len)` pairs.
    ///
    /// # Panics
    ///
    /// Panics if the segment ids are not strictly ascending.
    pub fn new(segments: &[(i64, i32)]) -> Self {
        let ledger = Self::default();
        for &(segment, len) in segments {
            ledger.push_segment(segment, len);
        }
        ledger
    }

    /// Appends a segment.
    ///
    /// # Panics
    ///
    /// Panics if `segment_id` does not follow the last segment.
    pub fn push_segment(&self, segment_id: i64, len: i32) {
        let mut table = self.segments.write();
        if let Some(&(last, _)) = table.0.last() {
            assert!(segment_id > last, "segments must be ascending");
        }
        table.0.push((segment_id, len.max(0)));
    }

    /// Appends `count` entries to the last segment.
    ///
    /// # Panics
    ///
    /// Panics if the ledger has no segment.
    pub fn extend_last(&self, count: i32) {
        let mut table = self.segments.write();
        let last = table.0.last_mut().expect("ledger has no segment");
        last.1 += count;
    }

    /// Every position in the ledger, ascending.
    pub fn positions(&self) -> Vec<Position> {
        let table = self.segments.read();
        table
            .0
            .iter()
            .flat_map(|&(segment, len)| (0..len).map(move |e| Position::new(segment, e)))
            .collect()
    }

    /// Total number of entries.
    pub fn len(&self) -> u64 {
        let table = self.segments.read();
        table.0.iter().map(|&(_, len)| len as u64).sum()
    }

    /// Whether the ledger holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerView for SequentialLedger {
    fn last_position(&self) -> Position {
        let table = self.segments.read();
        table
            .0
            .iter()
            .rev()
            .find(|&&(_, len)| len > 0)
            .map_or(Position::EARLIEST, |&(segment, len)| {
                Position::new(segment, len - 1)
            })
    }

    fn next_valid_position(&self, position: Position) -> Position {
        let table = self.segments.read();
        for &(segment, len) in &table.0 {
            if len == 0 || segment < position.segment_id {
                continue;
            }
            if segment > position.segment_id {
                return Position::new(segment, 0);
            }
            let next = position.entry_id.saturating_add(1).max(0);
            if next < len {
                return Position::new(segment, next);
            }
        }
        position.next()
    }

    fn entries_between(&self, from: Position, to: Position) -> u64 {
        let table = self.segments.read();
        table
            .count_through(to)
            .saturating_sub(table.count_through(from))
    }
}
