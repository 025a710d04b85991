//! Providers of numbered storage backends.
//!
//! A provider owns one storage root and hands out one backend per numeric
//! id. The file-system provider maps ids to files named by their decimal
//! value; anything else in the root (the `index` subdirectory, temp files)
//! is ignored when listing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// A backend handed out by a [`BackendProvider`].
pub struct OpenedBackend {
    /// The opened backend.
    pub backend: Box<dyn StorageBackend>,
    /// Whether the backend did not exist before this open.
    pub created: bool,
}

impl fmt::Debug for OpenedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedBackend")
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

/// A namespace of numbered storage backends under one root.
///
/// # Invariants
///
/// - `list` returns every id that `open` has created and `remove` has not
///   deleted, in ascending order
/// - `open` of an unknown id creates it; `created` reports which case applied
pub trait BackendProvider: Send + Sync + fmt::Debug {
    /// Human-readable description of the root, used in logs and errors.
    fn root(&self) -> String;

    /// Creates the root if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created.
    fn ensure_root(&self) -> StorageResult<()>;

    /// Lists the ids of all existing backends in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be read.
    fn list(&self) -> StorageResult<Vec<u64>>;

    /// Opens the backend for `id`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened or created.
    fn open(&self, id: u64) -> StorageResult<OpenedBackend>;

    /// Removes the backend for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the id does not exist.
    fn remove(&self, id: u64) -> StorageResult<()>;

    /// Human-readable location of one backend.
    fn location(&self, id: u64) -> String;
}

/// Backends stored as files named by their decimal id.
#[derive(Debug, Clone)]
pub struct FileBackendProvider {
    root: PathBuf,
}

impl FileBackendProvider {
    /// Creates a provider rooted at `root`. Nothing is touched on disk
    /// until [`BackendProvider::ensure_root`] or `open` is called.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the file backing `id`.
    #[must_use]
    pub fn file_path(&self, id: u64) -> PathBuf {
        self.root.join(id.to_string())
    }

    #[cfg(unix)]
    fn sync_root(&self) -> StorageResult<()> {
        File::open(&self.root)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_root(&self) -> StorageResult<()> {
        // NTFS journals directory metadata; no directory handle to sync.
        Ok(())
    }
}

impl BackendProvider for FileBackendProvider {
    fn root(&self) -> String {
        self.root.display().to_string()
    }

    fn ensure_root(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().and_then(|n| n.parse::<u64>().ok()) {
                Some(id) => ids.push(id),
                None => tracing::debug!(
                    root = %self.root.display(),
                    name = ?name,
                    "skipping non-numeric file"
                ),
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn open(&self, id: u64) -> StorageResult<OpenedBackend> {
        let path = self.file_path(id);
        let created = !path.exists();
        let backend = FileBackend::open_with_create_dirs(&path)?;
        if created {
            self.sync_root()?;
        }
        Ok(OpenedBackend {
            backend: Box::new(backend),
            created,
        })
    }

    fn remove(&self, id: u64) -> StorageResult<()> {
        match fs::remove_file(self.file_path(id)) {
            Ok(()) => self.sync_root(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound { id }),
            Err(e) => Err(e.into()),
        }
    }

    fn location(&self, id: u64) -> String {
        self.file_path(id).display().to_string()
    }
}

/// In-memory provider whose "files" survive being closed and reopened.
///
/// Supports injecting open failures so retry paths can be exercised.
#[derive(Debug, Default)]
pub struct InMemoryBackendProvider {
    files: Mutex<BTreeMap<u64, InMemoryBackend>>,
    failing_opens: AtomicU32,
}

impl InMemoryBackendProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls to `open` fail with an I/O error.
    pub fn fail_next_opens(&self, count: u32) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    /// Returns a handle onto the bytes of `id`, if it exists.
    #[must_use]
    pub fn backend(&self, id: u64) -> Option<InMemoryBackend> {
        self.files.lock().get(&id).cloned()
    }

    /// Installs raw bytes as backend `id`, replacing any existing data.
    pub fn insert(&self, id: u64, data: Vec<u8>) {
        self.files.lock().insert(id, InMemoryBackend::with_data(data));
    }
}

impl BackendProvider for InMemoryBackendProvider {
    fn root(&self) -> String {
        "memory".to_string()
    }

    fn ensure_root(&self) -> StorageResult<()> {
        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<u64>> {
        Ok(self.files.lock().keys().copied().collect())
    }

    fn open(&self, id: u64) -> StorageResult<OpenedBackend> {
        let injected = self
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("injected open failure for backend {id}"),
            )));
        }

        let mut files = self.files.lock();
        let created = !files.contains_key(&id);
        let backend = files.entry(id).or_default().clone();
        Ok(OpenedBackend {
            backend: Box::new(backend),
            created,
        })
    }

    fn remove(&self, id: u64) -> StorageResult<()> {
        self.files
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound { id })
    }

    fn location(&self, id: u64) -> String {
        format!("memory/{id}")
    }
}
