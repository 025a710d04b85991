//! Error types for EntryLog core.

use crate::types::Position;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in EntryLog core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] entrylog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Position index store error.
    #[error("index error: {0}")]
    Index(#[from] rocksdb::Error),

    /// Invalid on-disk format: bad magic, inconsistent header, malformed index value.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Initialization failed earlier; the instance cannot be used.
    ///
    /// Every caller of `initialize` observes the same underlying failure.
    #[error("initialization failed: {source}")]
    InitializeFailed {
        /// The failure the single initialization attempt produced.
        source: Arc<CoreError>,
    },

    /// The instance was closed and accepts no further operations.
    #[error("{what} is fenced")]
    Fenced {
        /// What was fenced (entry file, directory).
        what: String,
    },

    /// Read offset falls outside the written region of a file.
    #[error("offset {offset} out of range [{min}, {max}]")]
    OffsetOutOfRange {
        /// The requested offset.
        offset: u32,
        /// Lowest valid offset (the header size).
        min: u32,
        /// Highest valid offset (the wrote position).
        max: u32,
    },

    /// No entry at an offset inside the unflushed region.
    #[error("entry not found at offset {offset} of file {file_id}")]
    EntryNotFound {
        /// The file searched.
        file_id: u64,
        /// The offset that had no pending entry.
        offset: u32,
    },

    /// No entry is indexed at a position.
    #[error("no entry indexed at {position}")]
    PositionNotFound {
        /// The position that was looked up.
        position: Position,
    },

    /// The directory has no file with the given id.
    #[error("file {file_id} not found in directory {directory}")]
    FileNotFound {
        /// The directory searched.
        directory: String,
        /// The missing file id.
        file_id: u64,
    },

    /// The entry cannot be framed with a 4-byte length.
    #[error("entry of {len} bytes is too large")]
    EntryTooLarge {
        /// The rejected payload length.
        len: usize,
    },

    /// Acknowledging a position at or below the mark-delete watermark.
    #[error("position {position} is not after mark-delete position {mark_deleted}")]
    AlreadyAcknowledged {
        /// The rejected position.
        position: Position,
        /// The watermark at the time of the call.
        mark_deleted: Position,
    },

    /// Acknowledging the same position twice.
    #[error("position {position} was already acknowledged")]
    DuplicateAcknowledgment {
        /// The duplicated position.
        position: Position,
    },

    /// The index has been closed.
    #[error("index is closed")]
    IndexClosed,

    /// Cursor snapshot encoding or decoding failed.
    #[error("snapshot codec error: {message}")]
    Snapshot {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a fenced error.
    pub fn fenced(what: impl Into<String>) -> Self {
        Self::Fenced { what: what.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a snapshot codec error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Returns the innermost error, looking through `InitializeFailed`.
    #[must_use]
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::InitializeFailed { source } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this error (or its root cause) means the instance is fenced.
    #[must_use]
    pub fn is_fenced(&self) -> bool {
        matches!(self.root_cause(), Self::Fenced { .. })
    }
}
