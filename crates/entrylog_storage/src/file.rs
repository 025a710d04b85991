//! Disk-backed storage: one OS file per backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Handle and logical length, guarded together so a positional write and
/// the length it produces are never observed apart.
#[derive(Debug)]
struct Inner {
    file: File,
    len: u64,
    /// Writes since the last `sync`.
    dirty: bool,
}

impl Inner {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.len = self.len.max(offset + data.len() as u64);
        self.dirty = true;
        Ok(())
    }
}

/// A storage backend over one file.
///
/// Entry files write frames at offsets reserved in advance and rewrite
/// their header at offset 0, so every write is positional. `sync` is
/// skipped when nothing was written since the previous one.
///
/// ```no_run
/// use entrylog_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("0")).unwrap();
/// backend.write_at(12, b"frame").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileBackend {
    fn from_options(path: &Path, options: &OpenOptions) -> StorageResult<Self> {
        let file = options.open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                file,
                len,
                dirty: false,
            }),
        })
    }

    /// Opens the file at `path`, creating it empty if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::from_options(
            path,
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false),
        )
    }

    /// Opens the file at `path`, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error of kind `NotFound` for a missing file.
    pub fn open_existing(path: &Path) -> StorageResult<Self> {
        Self::from_options(path, OpenOptions::new().read(true).write(true))
    }

    /// Like [`open`](Self::open), creating missing parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        StorageError::check_read(offset, len, inner.len)?;

        let mut buf = vec![0u8; len];
        if len > 0 {
            inner.file.seek(SeekFrom::Start(offset))?;
            inner.file.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.inner.lock().write_at(offset, data)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut inner = self.inner.lock();
        let offset = inner.len;
        if !data.is_empty() {
            inner.write_at(offset, data)?;
        }
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.lock().file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if inner.dirty {
            inner.file.sync_all()?;
            inner.dirty = false;
        }
        Ok(())
    }
}
