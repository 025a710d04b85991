//! Per-consumer acknowledgment tracking.
//!
//! A cursor acknowledges positions two ways: a mark-delete watermark that
//! covers everything at or below it, and a set of positions above the
//! watermark acknowledged out of order. Advancing the watermark prunes the
//! set, so its size tracks only genuinely out-of-order acknowledgments.
//!
//! ## Invariants
//!
//! - Every member of the individually deleted set is `> mark_deleted`
//! - `is_deleted(p)` iff `p <= mark_deleted` or `p` is in the set
//! - A rejected acknowledgment leaves the cursor unchanged

use crate::error::{CoreError, CoreResult};
use crate::types::{Entry, Position};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// The log a cursor walks, as seen by the cursor.
pub trait LedgerView: Send + Sync {
    /// Position of the last entry, or [`Position::EARLIEST`] if empty.
    fn last_position(&self) -> Position;

    /// First position after `position` that holds an entry.
    fn next_valid_position(&self, position: Position) -> Position;

    /// Number of entries in `(from, to]`.
    fn entries_between(&self, from: Position, to: Position) -> u64;
}

/// Consumption state of one reader over one log.
pub trait Cursor: Send + Sync {
    /// Returns the cursor name.
    fn name(&self) -> &str;

    /// Returns the next position to read.
    fn read_position(&self) -> Position;

    /// Returns the mark-delete watermark.
    fn mark_deleted_position(&self) -> Position;

    /// Moves the read position to the first valid position after the
    /// watermark.
    fn rewind(&self);

    /// Moves the read position to `position`. Without `force`, a position
    /// covered by the watermark snaps forward to the first position that is
    /// not acknowledged.
    fn seek(&self, position: Position, force: bool);

    /// Acknowledges one position out of order.
    ///
    /// # Errors
    ///
    /// `AlreadyAcknowledged` if `position <= mark_deleted`,
    /// `DuplicateAcknowledgment` if it was acknowledged before.
    fn delete(&self, position: Position) -> CoreResult<()>;

    /// Acknowledges several positions; the first invalid one rejects all.
    ///
    /// # Errors
    ///
    /// Same as [`delete`](Self::delete), for any position of the batch,
    /// including one repeated inside the batch.
    fn delete_batch(&self, positions: &[Position]) -> CoreResult<()>;

    /// Advances the watermark to `position`.
    ///
    /// # Errors
    ///
    /// `AlreadyAcknowledged` if `position <= mark_deleted`.
    fn mark_delete(&self, position: Position) -> CoreResult<()>;

    /// Whether `position` is acknowledged.
    fn is_deleted(&self, position: Position) -> bool;

    /// Acknowledges everything up to the end of the log.
    fn clear_backlog(&self);

    /// Whether the read position is before the end of the log.
    fn has_more_entries(&self) -> bool;

    /// Entries after the watermark not yet acknowledged.
    fn backlog_entries(&self) -> u64;

    /// Size of the out-of-order acknowledgment set.
    fn individual_deleted_count(&self) -> usize;
}

#[derive(Debug, Clone)]
struct CursorState {
    read: Position,
    mark_deleted: Position,
    individual_deleted: BTreeSet<Position>,
}

impl CursorState {
    fn check_acknowledgment(&self, position: Position) -> CoreResult<()> {
        if position <= self.mark_deleted {
            return Err(CoreError::AlreadyAcknowledged {
                position,
                mark_deleted: self.mark_deleted,
            });
        }
        if self.individual_deleted.contains(&position) {
            return Err(CoreError::DuplicateAcknowledgment { position });
        }
        Ok(())
    }

    fn is_deleted(&self, position: Position) -> bool {
        position <= self.mark_deleted || self.individual_deleted.contains(&position)
    }
}

/// Serialized cursor state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorSnapshot {
    /// Cursor name.
    pub name: String,
    /// Read position at snapshot time.
    pub read_position: Position,
    /// Watermark at snapshot time.
    pub mark_deleted: Position,
    /// Out-of-order acknowledgments, ascending.
    pub individual_deleted: Vec<Position>,
}

impl CursorSnapshot {
    /// Encodes the snapshot as CBOR.
    ///
    /// # Errors
    ///
    /// Returns a `Snapshot` error if encoding fails.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CoreError::snapshot(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a snapshot produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns a `Snapshot` error if the bytes are not a valid snapshot.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::snapshot(e.to_string()))
    }
}

/// The default [`Cursor`], guarded by one reader/writer lock.
pub struct ManagedCursor {
    name: String,
    ledger: Arc<dyn LedgerView>,
    state: RwLock<CursorState>,
}

impl fmt::Debug for ManagedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ManagedCursor")
            .field("name", &self.name)
            .field("read", &state.read)
            .field("mark_deleted", &state.mark_deleted)
            .field("individual_deleted", &state.individual_deleted.len())
            .finish_non_exhaustive()
    }
}

impl ManagedCursor {
    /// Creates a cursor with nothing acknowledged, reading from the start.
    #[must_use]
    pub fn new(name: impl Into<String>, ledger: Arc<dyn LedgerView>) -> Self {
        let read = ledger.next_valid_position(Position::EARLIEST);
        Self {
            name: name.into(),
            ledger,
            state: RwLock::new(CursorState {
                read,
                mark_deleted: Position::EARLIEST,
                individual_deleted: BTreeSet::new(),
            }),
        }
    }

    /// Rebuilds a cursor from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a `Snapshot` error if the bytes do not decode, or
    /// `InvalidFormat` if the state breaks the cursor invariants.
    pub fn restore(bytes: &[u8], ledger: Arc<dyn LedgerView>) -> CoreResult<Self> {
        let snapshot = CursorSnapshot::from_bytes(bytes)?;
        if let Some(stale) = snapshot
            .individual_deleted
            .iter()
            .find(|p| **p <= snapshot.mark_deleted)
        {
            return Err(CoreError::invalid_format(format!(
                "cursor {} acknowledges {stale} at or below its watermark {}",
                snapshot.name, snapshot.mark_deleted
            )));
        }

        Ok(Self {
            name: snapshot.name,
            ledger,
            state: RwLock::new(CursorState {
                read: snapshot.read_position,
                mark_deleted: snapshot.mark_deleted,
                individual_deleted: snapshot.individual_deleted.into_iter().collect(),
            }),
        })
    }

    /// Captures the current state.
    #[must_use]
    pub fn snapshot(&self) -> CursorSnapshot {
        let state = self.state.read();
        CursorSnapshot {
            name: self.name.clone(),
            read_position: state.read,
            mark_deleted: state.mark_deleted,
            individual_deleted: state.individual_deleted.iter().copied().collect(),
        }
    }

    /// Removes acknowledged entries from `entries`, keeping order.
    pub fn trim_deleted_entries(&self, entries: &mut Vec<Entry>) {
        let state = self.state.read();
        entries.retain(|entry| !state.is_deleted(entry.position));
    }
}

impl Cursor for ManagedCursor {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_position(&self) -> Position {
        self.state.read().read
    }

    fn mark_deleted_position(&self) -> Position {
        self.state.read().mark_deleted
    }

    fn rewind(&self) {
        let mut state = self.state.write();
        state.read = self.ledger.next_valid_position(state.mark_deleted);
    }

    fn seek(&self, position: Position, force: bool) {
        let mut state = self.state.write();
        state.read = if !force && position <= state.mark_deleted {
            let mut candidate = self.ledger.next_valid_position(state.mark_deleted);
            while state.individual_deleted.contains(&candidate) {
                let next = self.ledger.next_valid_position(candidate);
                if next <= candidate {
                    break;
                }
                candidate = next;
            }
            candidate
        } else {
            position
        };
    }

    fn delete(&self, position: Position) -> CoreResult<()> {
        let mut state = self.state.write();
        state.check_acknowledgment(position)?;
        state.individual_deleted.insert(position);
        Ok(())
    }

    fn delete_batch(&self, positions: &[Position]) -> CoreResult<()> {
        let mut state = self.state.write();
        let mut batch = BTreeSet::new();
        for &position in positions {
            state.check_acknowledgment(position)?;
            if !batch.insert(position) {
                return Err(CoreError::DuplicateAcknowledgment { position });
            }
        }
        state.individual_deleted.append(&mut batch);
        Ok(())
    }

    fn mark_delete(&self, position: Position) -> CoreResult<()> {
        let mut state = self.state.write();
        if position <= state.mark_deleted {
            return Err(CoreError::AlreadyAcknowledged {
                position,
                mark_deleted: state.mark_deleted,
            });
        }

        state.mark_deleted = position;
        let mut above = state.individual_deleted.split_off(&position);
        above.remove(&position);
        state.individual_deleted = above;

        if state.read <= position {
            state.read = self.ledger.next_valid_position(position);
        }
        Ok(())
    }

    fn is_deleted(&self, position: Position) -> bool {
        self.state.read().is_deleted(position)
    }

    fn clear_backlog(&self) {
        let last = self.ledger.last_position();
        let mut state = self.state.write();
        state.mark_deleted = last;
        state.read = last;
        state.individual_deleted.clear();
    }

    fn has_more_entries(&self) -> bool {
        self.state.read().read < self.ledger.last_position()
    }

    fn backlog_entries(&self) -> u64 {
        let state = self.state.read();
        let last = self.ledger.last_position();
        let pending = self.ledger.entries_between(state.mark_deleted, last);
        let acknowledged = state
            .individual_deleted
            .range(..=last)
            .count() as u64;
        pending.saturating_sub(acknowledged)
    }

    fn individual_deleted_count(&self) -> usize {
        self.state.read().individual_deleted.len()
    }
}
