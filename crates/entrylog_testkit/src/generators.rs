//! Property-based test generators using proptest.

use bytes::Bytes;
use entrylog_core::{Cursor, Position};
use proptest::prelude::*;

/// Strategy for generating entry payloads up to `max_len` bytes.
pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..=max_len).prop_map(Bytes::from)
}

/// Strategy for generating a batch of payloads.
pub fn payload_batch_strategy(
    max_len: usize,
    max_batch: usize,
) -> impl Strategy<Value = Vec<Bytes>> {
    prop::collection::vec(payload_strategy(max_len), 1..=max_batch)
}

/// Strategy for positions within `segments` segments of `entries` entries.
pub fn position_strategy(segments: i64, entries: i32) -> impl Strategy<Value = Position> {
    (0..segments, 0..entries).prop_map(|(s, e)| Position::new(s, e))
}

/// Strategy for arbitrary positions, sentinels included.
pub fn any_position_strategy() -> impl Strategy<Value = Position> {
    prop_oneof![
        1 => Just(Position::EARLIEST),
        1 => Just(Position::LATEST),
        8 => (any::<i64>(), any::<i32>()).prop_map(|(s, e)| Position::new(s, e)),
    ]
}

/// One operation against a cursor.
#[derive(Debug, Clone)]
pub enum CursorOp {
    /// Acknowledge one position.
    Delete(Position),
    /// Acknowledge several positions atomically.
    DeleteBatch(Vec<Position>),
    /// Move the watermark.
    MarkDelete(Position),
    /// Move the read position.
    Seek(Position, bool),
    /// Read again from after the watermark.
    Rewind,
}

impl CursorOp {
    /// Applies the operation. Rejected acknowledgments are ignored.
    pub fn apply(&self, cursor: &dyn Cursor) -> bool {
        match self {
            Self::Delete(p) => cursor.delete(*p).is_ok(),
            Self::DeleteBatch(ps) => cursor.delete_batch(ps).is_ok(),
            Self::MarkDelete(p) => cursor.mark_delete(*p).is_ok(),
            Self::Seek(p, force) => {
                cursor.seek(*p, *force);
                true
            }
            Self::Rewind => {
                cursor.rewind();
                true
            }
        }
    }
}

/// Strategy for cursor operations over a single-segment ledger.
pub fn cursor_op_strategy(segment: i64, entries: i32) -> impl Strategy<Value = CursorOp> {
    let pos = move || (0..entries).prop_map(move |e| Position::new(segment, e));
    prop_oneof![
        4 => pos().prop_map(CursorOp::Delete),
        2 => prop::collection::vec(pos(), 1..5).prop_map(CursorOp::DeleteBatch),
        3 => pos().prop_map(CursorOp::MarkDelete),
        1 => (pos(), any::<bool>()).prop_map(|(p, f)| CursorOp::Seek(p, f)),
        1 => Just(CursorOp::Rewind),
    ]
}

/// Strategy for a sequence of cursor operations.
pub fn cursor_ops_strategy(
    segment: i64,
    entries: i32,
    max_ops: usize,
) -> impl Strategy<Value = Vec<CursorOp>> {
    prop::collection::vec(cursor_op_strategy(segment, entries), 1..=max_ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SequentialLedger;
    use entrylog_core::ManagedCursor;
    use std::sync::Arc;

    proptest! {
        #[test]
        fn payloads_respect_bound(payload in payload_strategy(64)) {
            prop_assert!(payload.len() <= 64);
        }

        #[test]
        fn positions_stay_in_range(p in position_strategy(3, 10)) {
            prop_assert!((0..3).contains(&p.segment_id));
            prop_assert!((0..10).contains(&p.entry_id));
        }

        #[test]
        fn watermark_only_moves_forward(ops in cursor_ops_strategy(0, 32, 40)) {
            let cursor = ManagedCursor::new("prop", Arc::new(SequentialLedger::new(&[(0, 32)])));
            let mut watermark = cursor.mark_deleted_position();
            for op in &ops {
                op.apply(&cursor);
                let current = cursor.mark_deleted_position();
                prop_assert!(current >= watermark);
                watermark = current;

                let snapshot = cursor.snapshot();
                prop_assert!(snapshot.individual_deleted.iter().all(|p| *p > current));
                prop_assert_eq!(cursor.individual_deleted_count(), snapshot.individual_deleted.len());
            }
        }
    }
}
