//! Single append-only entry file with buffered writes and crash recovery.
//!
//! ## File Format
//!
//! ```text
//! | magic (4) | wrote (4) | flushed (4) | length (4) | payload (N) | length (4) | ...
//! ```
//!
//! All integers are big-endian. `wrote` is the end of the last reserved
//! frame, `flushed` the end of the durable region.
//!
//! ## Write Path
//!
//! `add` reserves a frame with one atomic update of the write offset and
//! parks the payload in a pending map keyed by that offset. `flush` drains
//! the pending map in offset order, starting at `flushed`, stopping at the
//! first gap (a reservation whose payload has not been parked yet).
//!
//! ## Recovery Policy
//!
//! A pre-existing file is opened read-only. Its header must carry the magic
//! number and `wrote == flushed`; anything else is fatal. A zero-length file
//! is a creation that died before its header was written and is initialized
//! as new.

mod header;

pub use header::{FileHeader, FRAME_PREFIX_SIZE, HEADER_SIZE, MAGIC};

use crate::config::StorageConfig;
use crate::error::{CoreError, CoreResult};
use crate::state::{AtomicLifecycle, LifecycleState};
use bytes::Bytes;
use entrylog_storage::{BackendProvider, OpenedBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Back-off between checks while close waits for in-flight operations.
const DRAIN_BACKOFF: Duration = Duration::from_millis(1);

/// Largest payload whose frame can be addressed by a 4-byte offset.
const MAX_PAYLOAD: u64 = u32::MAX as u64 - HEADER_SIZE as u64 - FRAME_PREFIX_SIZE as u64;

/// Result of [`EntryFile::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was accepted at this frame offset.
    Added(u32),
    /// The reservation crossed the size threshold; roll to a new file.
    Full,
    /// The file was recovered from disk and accepts no writes.
    ReadOnly,
}

/// One physical file of an entry log.
pub struct EntryFile {
    id: u64,
    provider: Arc<dyn BackendProvider>,
    threshold: u64,
    max_cache: u64,
    state: AtomicLifecycle,
    init: OnceCell<Result<(), Arc<CoreError>>>,
    backend: RwLock<Option<Box<dyn StorageBackend>>>,
    wrote: AtomicU64,
    flushed: AtomicU64,
    read_only: AtomicBool,
    pending: Mutex<BTreeMap<u64, Bytes>>,
    cached: AtomicU64,
    pending_ops: AtomicUsize,
    /// Serializes flush and close, which both touch the handle and header.
    io_lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for EntryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryFile")
            .field("id", &self.id)
            .field("state", &self.state.load())
            .field("wrote", &self.wrote.load(Ordering::Relaxed))
            .field("flushed", &self.flushed.load(Ordering::Relaxed))
            .field("read_only", &self.read_only.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Decrements the pending-operation counter on drop.
struct OpGuard<'a>(&'a AtomicUsize);

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl EntryFile {
    /// Creates a handle for file `id`. Nothing is opened until
    /// [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(id: u64, provider: Arc<dyn BackendProvider>, config: &StorageConfig) -> Self {
        Self {
            id,
            provider,
            threshold: config.threshold().max(u64::from(HEADER_SIZE)),
            max_cache: config.max_entry_cache_per_file,
            state: AtomicLifecycle::new(),
            init: OnceCell::new(),
            backend: RwLock::new(None),
            wrote: AtomicU64::new(u64::from(HEADER_SIZE)),
            flushed: AtomicU64::new(u64::from(HEADER_SIZE)),
            read_only: AtomicBool::new(false),
            pending: Mutex::new(BTreeMap::new()),
            cached: AtomicU64::new(0),
            pending_ops: AtomicUsize::new(0),
            io_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the file id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns where the file lives, for logs and errors.
    #[must_use]
    pub fn location(&self) -> String {
        self.provider.location(self.id)
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    /// Returns the write offset: the end of the last reserved frame.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.wrote.load(Ordering::Acquire)
    }

    /// Returns the end of the durable region.
    #[must_use]
    pub fn flushed(&self) -> u64 {
        self.flushed.load(Ordering::Acquire)
    }

    /// Returns the bytes (frames included) waiting to be flushed.
    #[must_use]
    pub fn pending_bytes(&self) -> u64 {
        self.cached.load(Ordering::Acquire)
    }

    /// Whether the file accepts no more writes: it was recovered from disk,
    /// or its write offset is past the size threshold.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire) || self.size() > self.threshold
    }

    /// Opens the file, recovering or writing its header.
    ///
    /// Only the first call does the work; concurrent and later callers
    /// observe the same outcome.
    ///
    /// # Errors
    ///
    /// Returns `Fenced` after close, or `InitializeFailed` wrapping the
    /// error of the single attempt.
    pub async fn initialize(&self) -> CoreResult<()> {
        if self.state.load() == LifecycleState::Fenced {
            return Err(self.fenced());
        }
        let outcome = self
            .init
            .get_or_init(|| async { self.open().map_err(Arc::new) })
            .await;
        match outcome {
            Ok(()) => Ok(()),
            Err(source) => Err(CoreError::InitializeFailed {
                source: Arc::clone(source),
            }),
        }
    }

    fn open(&self) -> CoreResult<()> {
        self.state
            .transition(LifecycleState::New, LifecycleState::Initializing)
            .map_err(|observed| {
                CoreError::invalid_operation(format!(
                    "entry file {} cannot initialize from state {observed}",
                    self.id
                ))
            })?;

        match self.open_backend() {
            Ok(backend) => {
                *self.backend.write() = Some(backend);
                self.state
                    .transition(LifecycleState::Initializing, LifecycleState::Initialized)
                    .map_err(|_| self.fenced())
            }
            Err(e) => {
                let _ = self.state.transition(
                    LifecycleState::Initializing,
                    LifecycleState::InitializeFailed,
                );
                Err(e)
            }
        }
    }

    fn open_backend(&self) -> CoreResult<Box<dyn StorageBackend>> {
        let OpenedBackend {
            mut backend,
            created,
        } = self.provider.open(self.id)?;
        let size = backend.size()?;

        if created || size == 0 {
            backend.write_at(0, &FileHeader::EMPTY.encode())?;
            backend.sync()?;
            tracing::debug!(file_id = self.id, "created entry file");
            return Ok(backend);
        }

        if size < u64::from(HEADER_SIZE) {
            return Err(CoreError::invalid_format(format!(
                "entry file {} is {size} bytes, shorter than its header",
                self.id
            )));
        }
        let header = FileHeader::decode(&backend.read_at(0, HEADER_SIZE as usize)?)?;
        if !header.is_clean() {
            return Err(CoreError::invalid_format(format!(
                "entry file {} was not flushed before close: wrote={} flushed={}",
                self.id, header.wrote, header.flushed
            )));
        }
        if u64::from(header.flushed) > size {
            return Err(CoreError::invalid_format(format!(
                "entry file {} header claims {} bytes but file has {size}",
                self.id, header.flushed
            )));
        }

        self.wrote.store(u64::from(header.wrote), Ordering::Release);
        self.flushed.store(u64::from(header.flushed), Ordering::Release);
        self.read_only.store(true, Ordering::Release);
        tracing::debug!(
            file_id = self.id,
            flushed = header.flushed,
            "recovered entry file"
        );
        Ok(backend)
    }

    /// Reserves a frame for `data` and parks it until the next flush.
    ///
    /// When the pending bytes exceed the per-file cache limit the call
    /// waits for a flush before returning.
    ///
    /// # Errors
    ///
    /// Returns `Fenced` after close, `EntryTooLarge` if the payload cannot
    /// be framed, or an error if the file is not initialized.
    pub async fn add(&self, data: Bytes) -> CoreResult<AddOutcome> {
        let _op = self.admit()?;
        if self.read_only.load(Ordering::Acquire) {
            return Ok(AddOutcome::ReadOnly);
        }

        let len = data.len() as u64;
        if len > MAX_PAYLOAD {
            return Err(CoreError::EntryTooLarge { len: data.len() });
        }
        let frame = len + u64::from(FRAME_PREFIX_SIZE);

        let threshold = self.threshold;
        let reserved = self
            .wrote
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |offset| {
                let fits = offset <= threshold && offset + frame <= u64::from(u32::MAX);
                fits.then_some(offset + frame)
            });
        let Ok(offset) = reserved else {
            return Ok(AddOutcome::Full);
        };

        self.pending.lock().insert(offset, data);
        let cached = self.cached.fetch_add(frame, Ordering::AcqRel) + frame;

        if cached > self.max_cache {
            if let Err(e) = self.flush().await {
                tracing::warn!(file_id = self.id, error = %e, "back-pressure flush failed");
            }
        }

        // offset <= threshold <= u32::MAX
        Ok(AddOutcome::Added(offset as u32))
    }

    /// Writes pending entries contiguous with the durable region, then
    /// persists the header and syncs. No-op when nothing is pending.
    ///
    /// # Errors
    ///
    /// Returns `Fenced` after close, or the first I/O error.
    pub async fn flush(&self) -> CoreResult<()> {
        if self.state.load() == LifecycleState::Fenced {
            return Err(self.fenced());
        }
        if self.pending.lock().is_empty() {
            return Ok(());
        }
        let _io = self.io_lock.lock().await;
        self.drain_pending()
    }

    fn drain_pending(&self) -> CoreResult<()> {
        let mut slot = self.backend.write();
        let Some(backend) = slot.as_mut() else {
            return Ok(());
        };

        let mut frames = 0usize;
        loop {
            let flushed = self.flushed.load(Ordering::Acquire);
            let Some(data) = self.pending.lock().get(&flushed).cloned() else {
                break;
            };

            let mut frame = Vec::with_capacity(FRAME_PREFIX_SIZE as usize + data.len());
            // len <= MAX_PAYLOAD, checked in add
            frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
            frame.extend_from_slice(&data);
            backend.write_at(flushed, &frame)?;

            let frame_len = frame.len() as u64;
            self.flushed.store(flushed + frame_len, Ordering::Release);
            self.pending.lock().remove(&flushed);
            self.cached.fetch_sub(frame_len, Ordering::AcqRel);
            frames += 1;
        }

        if frames == 0 {
            return Ok(());
        }

        let header = FileHeader {
            wrote: clamp_offset(self.wrote.load(Ordering::Acquire)),
            flushed: clamp_offset(self.flushed.load(Ordering::Acquire)),
        };
        backend.flush()?;
        backend.write_at(0, &header.encode())?;
        backend.sync()?;
        tracing::debug!(
            file_id = self.id,
            frames,
            flushed = header.flushed,
            "flushed entry file"
        );
        Ok(())
    }

    /// Reads the payload of the frame at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `OffsetOutOfRange` outside `[HEADER_SIZE, wrote]`,
    /// `EntryNotFound` for an unflushed offset with no parked payload,
    /// `Fenced` after close, or an I/O error.
    pub async fn read_entry(&self, offset: u32) -> CoreResult<Bytes> {
        let _op = self.admit()?;

        let wrote = self.wrote.load(Ordering::Acquire);
        let at = u64::from(offset);
        if offset < HEADER_SIZE || at > wrote {
            return Err(CoreError::OffsetOutOfRange {
                offset,
                min: HEADER_SIZE,
                max: clamp_offset(wrote),
            });
        }

        if at < self.flushed.load(Ordering::Acquire) {
            return self.read_flushed(at);
        }
        if let Some(data) = self.pending.lock().get(&at) {
            return Ok(data.clone());
        }
        // flush advances `flushed` before it drops the parked payload
        if at < self.flushed.load(Ordering::Acquire) {
            return self.read_flushed(at);
        }
        Err(CoreError::EntryNotFound {
            file_id: self.id,
            offset,
        })
    }

    fn read_flushed(&self, at: u64) -> CoreResult<Bytes> {
        let slot = self.backend.read();
        let backend = slot.as_ref().ok_or_else(|| self.fenced())?;

        let prefix = backend.read_at(at, FRAME_PREFIX_SIZE as usize)?;
        let len = header::read_u32(&prefix, 0);
        let start = at + u64::from(FRAME_PREFIX_SIZE);
        let end = start + u64::from(len);
        let flushed = self.flushed.load(Ordering::Acquire);
        if end > flushed {
            return Err(CoreError::invalid_format(format!(
                "frame at {at} of entry file {} ends at {end}, past flushed {flushed}",
                self.id
            )));
        }

        Ok(Bytes::from(backend.read_at(start, len as usize)?))
    }

    /// Flushes, fences, waits for in-flight operations, then releases the
    /// file handle. Later calls return immediately.
    ///
    /// # Errors
    ///
    /// Returns the flush error, after the file has still been fenced and
    /// released.
    pub async fn close(&self) -> CoreResult<()> {
        if self.state.load() == LifecycleState::Fenced {
            return Ok(());
        }
        let flushed = self.flush().await;
        if !self.state.fence() {
            return flushed;
        }

        while self.pending_ops.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_BACKOFF).await;
        }

        let _io = self.io_lock.lock().await;
        // adds admitted before the fence may have parked more entries
        let drained = flushed.and_then(|()| self.drain_pending());
        if let Some(mut backend) = self.backend.write().take() {
            backend.flush()?;
        }
        tracing::debug!(file_id = self.id, "closed entry file");
        drained
    }

    /// Closes the file, then removes it from storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub async fn delete(&self) -> CoreResult<()> {
        let closed = self.close().await;
        if let Err(e) = &closed {
            tracing::warn!(file_id = self.id, error = %e, "close before delete failed");
        }
        self.provider.remove(self.id)?;
        tracing::info!(file_id = self.id, "deleted entry file");
        Ok(())
    }

    fn admit(&self) -> CoreResult<OpGuard<'_>> {
        self.pending_ops.fetch_add(1, Ordering::SeqCst);
        let guard = OpGuard(&self.pending_ops);
        match self.state.load() {
            LifecycleState::Initialized => Ok(guard),
            LifecycleState::Fenced => Err(self.fenced()),
            other => Err(CoreError::invalid_operation(format!(
                "entry file {} is {other}",
                self.id
            ))),
        }
    }

    fn fenced(&self) -> CoreError {
        CoreError::fenced(format!("entry file {}", self.id))
    }
}

fn clamp_offset(offset: u64) -> u32 {
    u32::try_from(offset).unwrap_or(u32::MAX)
}
