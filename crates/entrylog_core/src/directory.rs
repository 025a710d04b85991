//! Rolling set of entry files under one storage root.
//!
//! ```text
//! <root>/
//! ├─ 0        # entry files, named by decimal id
//! ├─ 1
//! ├─ 2        # highest id: the write target
//! └─ index/   # position index (see `index`)
//! ```
//!
//! The highest-id file is the only one that takes writes. When it reports
//! full (or was recovered read-only) the directory rolls over to the next
//! id. Concurrent writers racing to roll the same id share one creation
//! attempt through a per-directory coalescing map.

use crate::config::StorageConfig;
use crate::entry_file::{AddOutcome, EntryFile};
use crate::error::{CoreError, CoreResult};
use crate::state::{AtomicLifecycle, LifecycleState};
use crate::types::FileLocation;
use bytes::Bytes;
use entrylog_storage::{BackendProvider, FileBackendProvider};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

type SharedOutcome<T> = Result<T, Arc<CoreError>>;

/// Allocator of entry file ids, shareable between directories.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator(Arc<AtomicU64>);

impl IdGenerator {
    /// Creates a generator whose next id is `start`.
    #[must_use]
    pub fn new(start: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    /// Returns the next id to be allocated.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Ensures the next id is greater than `id`.
    pub fn advance_past(&self, id: u64) {
        self.0.fetch_max(id.saturating_add(1), Ordering::AcqRel);
    }
}

/// An ordered collection of entry files for one storage root.
pub struct Directory {
    provider: Arc<dyn BackendProvider>,
    config: StorageConfig,
    ids: IdGenerator,
    state: AtomicLifecycle,
    init: OnceCell<SharedOutcome<()>>,
    files: RwLock<BTreeMap<u64, Arc<EntryFile>>>,
    pending_creates: Mutex<HashMap<u64, Arc<OnceCell<SharedOutcome<Arc<EntryFile>>>>>>,
    flusher: Mutex<Option<JoinHandle<()>>>,
    this: Weak<Directory>,
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("root", &self.provider.root())
            .field("state", &self.state.load())
            .field("files", &self.files.read().len())
            .field("next_id", &self.ids.current())
            .finish_non_exhaustive()
    }
}

impl Directory {
    /// Creates a directory over `provider` with its own id generator.
    #[must_use]
    pub fn new(provider: Arc<dyn BackendProvider>, config: StorageConfig) -> Arc<Self> {
        Self::with_id_generator(provider, config, IdGenerator::default())
    }

    /// Creates a directory of files under `path`.
    #[must_use]
    pub fn open(path: impl AsRef<Path>, config: StorageConfig) -> Arc<Self> {
        Self::new(
            Arc::new(FileBackendProvider::new(path.as_ref())),
            config,
        )
    }

    /// Creates a directory that allocates ids from `ids`.
    #[must_use]
    pub fn with_id_generator(
        provider: Arc<dyn BackendProvider>,
        config: StorageConfig,
        ids: IdGenerator,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            provider,
            config,
            ids,
            state: AtomicLifecycle::new(),
            init: OnceCell::new(),
            files: RwLock::new(BTreeMap::new()),
            pending_creates: Mutex::new(HashMap::new()),
            flusher: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// Returns the storage root.
    #[must_use]
    pub fn path(&self) -> String {
        self.provider.root()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.load()
    }

    /// Returns the id generator this directory allocates from.
    #[must_use]
    pub fn id_generator(&self) -> &IdGenerator {
        &self.ids
    }

    /// Returns the storage configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the highest-id file, the write target.
    #[must_use]
    pub fn last_entry_file(&self) -> Option<Arc<EntryFile>> {
        self.files.read().values().next_back().cloned()
    }

    /// Returns every file in id order.
    #[must_use]
    pub fn entry_files(&self) -> Vec<Arc<EntryFile>> {
        self.files.read().values().cloned().collect()
    }

    /// Whether a file with `id` is open in this directory.
    #[must_use]
    pub fn contains_file(&self, id: u64) -> bool {
        self.files.read().contains_key(&id)
    }

    /// Total bytes written across all files, headers included.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.files.read().values().map(|file| file.size()).sum()
    }

    /// Creates the root if needed and recovers every existing file.
    ///
    /// Only the first call does the work; concurrent and later callers
    /// observe the same outcome.
    ///
    /// # Errors
    ///
    /// Returns `Fenced` after close, or `InitializeFailed` if any file
    /// could not be recovered within the configured attempts.
    pub async fn initialize(&self) -> CoreResult<()> {
        if self.state.load() == LifecycleState::Fenced {
            return Err(self.fenced());
        }
        let outcome = self
            .init
            .get_or_init(|| async { self.recover().await.map_err(Arc::new) })
            .await;
        match outcome {
            Ok(()) => Ok(()),
            Err(source) => Err(CoreError::InitializeFailed {
                source: Arc::clone(source),
            }),
        }
    }

    async fn recover(&self) -> CoreResult<()> {
        self.state
            .transition(LifecycleState::New, LifecycleState::Initializing)
            .map_err(|observed| {
                CoreError::invalid_operation(format!(
                    "directory {} cannot initialize from state {observed}",
                    self.path()
                ))
            })?;

        if let Err(e) = self.recover_files().await {
            let _ = self
                .state
                .transition(LifecycleState::Initializing, LifecycleState::InitializeFailed);
            tracing::error!(directory = %self.path(), error = %e, "directory recovery failed");
            return Err(e);
        }

        self.state
            .transition(LifecycleState::Initializing, LifecycleState::Initialized)
            .map_err(|_| self.fenced())?;
        self.start_flusher();
        tracing::info!(
            directory = %self.path(),
            files = self.files.read().len(),
            next_id = self.ids.current(),
            "directory initialized"
        );
        Ok(())
    }

    async fn recover_files(&self) -> CoreResult<()> {
        self.provider.ensure_root()?;
        for id in self.provider.list()? {
            let file = self.open_file(id, self.config.open_retries, "recover").await?;
            self.files.write().insert(id, file);
            self.ids.advance_past(id);
        }
        Ok(())
    }

    /// Opens file `id`, retrying with a fresh instance after each failure.
    async fn open_file(
        &self,
        id: u64,
        attempts: u32,
        action: &'static str,
    ) -> CoreResult<Arc<EntryFile>> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            let file = Arc::new(EntryFile::new(id, Arc::clone(&self.provider), &self.config));
            match file.initialize().await {
                Ok(()) => return Ok(file),
                Err(e) => {
                    if let Err(close_err) = file.close().await {
                        tracing::debug!(file_id = id, error = %close_err, "cleanup after failed open");
                    }
                    if attempt >= attempts {
                        return Err(e);
                    }
                    tracing::warn!(
                        directory = %self.path(),
                        file_id = id,
                        attempt,
                        action,
                        error = %e,
                        "entry file open failed, retrying"
                    );
                    attempt += 1;
                }
            }
        }
    }

    async fn ensure_initialized(&self) -> CoreResult<()> {
        match self.state.load() {
            LifecycleState::Initialized => Ok(()),
            LifecycleState::Fenced => Err(self.fenced()),
            _ => self.initialize().await,
        }
    }

    /// Appends `data` to the current file, rolling over as needed.
    ///
    /// # Errors
    ///
    /// Returns `Fenced` after close, or the error of a failed rollover.
    pub async fn add(&self, data: Bytes) -> CoreResult<FileLocation> {
        self.ensure_initialized().await?;
        loop {
            let current = self.last_entry_file();
            let writable = current.as_ref().filter(|file| !file.is_read_only());
            let Some(file) = writable else {
                self.next_file(current.as_ref().map(|file| file.id())).await?;
                continue;
            };

            match file.add(data.clone()).await? {
                AddOutcome::Added(offset) => return Ok(FileLocation::new(file.id(), offset)),
                AddOutcome::Full | AddOutcome::ReadOnly => {
                    self.next_file(Some(file.id())).await?;
                }
            }
        }
    }

    /// Rolls over past the file `observed` as the write target.
    async fn next_file(&self, observed: Option<u64>) -> CoreResult<Arc<EntryFile>> {
        if let Some(last) = self.last_entry_file() {
            if Some(last.id()) != observed && !last.is_read_only() {
                return Ok(last);
            }
        }

        let id = self.ids.current();
        let cell = Arc::clone(
            self.pending_creates
                .lock()
                .entry(id)
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );
        let outcome = cell
            .get_or_init(|| async { self.create_file(id).await.map_err(Arc::new) })
            .await
            .clone();

        {
            let mut creates = self.pending_creates.lock();
            if creates.get(&id).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                creates.remove(&id);
            }
        }

        outcome.map_err(|source| CoreError::InitializeFailed { source })
    }

    async fn create_file(&self, id: u64) -> CoreResult<Arc<EntryFile>> {
        if let Some(existing) = self.files.read().get(&id).cloned() {
            return Ok(existing);
        }

        self.spawn_flush();
        let file = self.open_file(id, self.config.create_retries, "create").await?;
        self.files.write().insert(id, Arc::clone(&file));
        self.ids.advance_past(id);

        // a close that fenced earlier either saw this file or is caught here
        if self.state.load() == LifecycleState::Fenced {
            if let Err(e) = file.close().await {
                tracing::warn!(file_id = id, error = %e, "close of file created during shutdown failed");
            }
            return Err(self.fenced());
        }
        tracing::info!(directory = %self.path(), file_id = id, "rolled over to new entry file");
        Ok(file)
    }

    /// Starts a flush of every file without waiting for it.
    fn spawn_flush(&self) {
        let Some(directory) = self.this.upgrade() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = directory.flush().await {
                        tracing::debug!(error = %e, "background flush skipped");
                    }
                });
            }
            Err(_) => tracing::debug!("no runtime for background flush"),
        }
    }

    fn start_flusher(&self) {
        let interval = self.config.flush_interval;
        if interval.is_zero() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let this = self.this.clone();
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(directory) = this.upgrade() else {
                    break;
                };
                if directory.state() == LifecycleState::Fenced {
                    break;
                }
                if let Err(e) = directory.flush().await {
                    tracing::warn!(directory = %directory.path(), error = %e, "periodic flush failed");
                }
            }
        });
        *self.flusher.lock() = Some(task);
    }

    /// Reads the entry at `location`.
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` for an unknown file id, or the file's read error.
    pub async fn read_entry(&self, location: FileLocation) -> CoreResult<Bytes> {
        self.ensure_initialized().await?;
        let file = self
            .files
            .read()
            .get(&location.file_id)
            .cloned()
            .ok_or_else(|| CoreError::FileNotFound {
                directory: self.path(),
                file_id: location.file_id,
            })?;
        file.initialize().await?;
        file.read_entry(location.offset).await
    }

    /// Flushes every file. Failures are logged and do not stop the others.
    ///
    /// # Errors
    ///
    /// Returns `Fenced` after close.
    pub async fn flush(&self) -> CoreResult<()> {
        if self.state.load() == LifecycleState::Fenced {
            return Err(self.fenced());
        }
        self.for_each_file("flush", |file| async move { file.flush().await })
            .await;
        Ok(())
    }

    /// Flushes and fences the directory, then closes every file.
    /// Later calls return immediately.
    ///
    /// # Errors
    ///
    /// Per-file failures are logged, not returned.
    pub async fn close(&self) -> CoreResult<()> {
        if self.state.load() == LifecycleState::Fenced {
            return Ok(());
        }
        if let Some(task) = self.flusher.lock().take() {
            task.abort();
        }

        self.for_each_file("flush", |file| async move { file.flush().await })
            .await;
        if !self.state.fence() {
            return Ok(());
        }
        self.for_each_file("close", |file| async move { file.close().await })
            .await;
        tracing::info!(directory = %self.path(), "directory closed");
        Ok(())
    }

    /// Closes the directory, then deletes every file.
    ///
    /// # Errors
    ///
    /// Per-file failures are logged, not returned.
    pub async fn delete(&self) -> CoreResult<()> {
        self.close().await?;
        self.for_each_file("delete", |file| async move { file.delete().await })
            .await;
        self.files.write().clear();
        tracing::info!(directory = %self.path(), "directory deleted");
        Ok(())
    }

    async fn for_each_file<F, Fut>(&self, action: &'static str, op: F)
    where
        F: Fn(Arc<EntryFile>) -> Fut,
        Fut: Future<Output = CoreResult<()>>,
    {
        let files = self.entry_files();
        let results = join_all(files.iter().map(|file| op(Arc::clone(file)))).await;
        for (file, result) in files.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(
                    directory = %self.path(),
                    file_id = file.id(),
                    action,
                    error = %e,
                    "entry file operation failed"
                );
            }
        }
    }

    fn fenced(&self) -> CoreError {
        CoreError::fenced(format!("directory {}", self.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry_file::FileHeader;
    use entrylog_storage::{InMemoryBackendProvider, OpenedBackend, StorageResult};
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tempfile::tempdir;

    fn memory_directory(threshold: u64) -> (Arc<InMemoryBackendProvider>, Arc<Directory>) {
        let provider = Arc::new(InMemoryBackendProvider::new());
        let config = StorageConfig::new().max_entry_file_size(threshold);
        let directory = Directory::new(provider.clone(), config);
        (provider, directory)
    }

    #[test]
    fn id_generator_only_moves_forward() {
        let ids = IdGenerator::default();
        ids.advance_past(4);
        ids.advance_past(2);
        assert_eq!(ids.current(), 5);
    }

    #[tokio::test]
    async fn first_add_creates_file_zero() {
        let (provider, directory) = memory_directory(1 << 20);

        let location = directory.add(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(location, FileLocation::new(0, 12));
        assert_eq!(provider.list().unwrap(), vec![0]);
        assert_eq!(directory.id_generator().current(), 1);
        assert_eq!(
            &directory.read_entry(location).await.unwrap()[..],
            b"hello"
        );
    }

    #[tokio::test]
    async fn full_file_rolls_over_without_dropping_entry() {
        let (provider, directory) = memory_directory(2048);
        let payload = Bytes::from(vec![9u8; 1024]);

        let a = directory.add(payload.clone()).await.unwrap();
        let b = directory.add(payload.clone()).await.unwrap();
        let c = directory.add(payload.clone()).await.unwrap();

        assert_eq!(a, FileLocation::new(0, 12));
        assert_eq!(b, FileLocation::new(0, 1040));
        assert_eq!(c, FileLocation::new(1, 12));
        assert_eq!(provider.list().unwrap(), vec![0, 1]);
        assert_eq!(directory.read_entry(c).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn rollover_flushes_previous_file() {
        let (provider, directory) = memory_directory(64);
        directory.add(Bytes::from(vec![1u8; 60])).await.unwrap();
        directory.add(Bytes::from(vec![2u8; 60])).await.unwrap();
        directory.flush().await.unwrap();

        let header = FileHeader::decode(&provider.backend(0).unwrap().data()).unwrap();
        assert_eq!(header.flushed, 12 + 64);
    }

    #[tokio::test]
    async fn read_unknown_file_fails() {
        let (_provider, directory) = memory_directory(1 << 20);
        directory.initialize().await.unwrap();

        let err = directory
            .read_entry(FileLocation::new(7, 12))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound { file_id: 7, .. }));
    }

    #[tokio::test]
    async fn reopen_recovers_files_and_ids() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new().max_entry_file_size(100);

        let mut locations = Vec::new();
        {
            let directory = Directory::open(dir.path(), config.clone());
            for i in 0u8..10 {
                let location = directory.add(Bytes::from(vec![i; 40])).await.unwrap();
                locations.push((location, i));
            }
            directory.close().await.unwrap();
        }

        let directory = Directory::open(dir.path(), config);
        directory.initialize().await.unwrap();
        let files = directory.entry_files();
        assert!(files.iter().all(|file| file.is_read_only()));
        let last_id = files.last().unwrap().id();
        assert_eq!(directory.id_generator().current(), last_id + 1);

        for (location, i) in locations {
            assert_eq!(
                directory.read_entry(location).await.unwrap(),
                Bytes::from(vec![i; 40])
            );
        }

        // recovered files are read-only, so new writes go to a new file
        let next = directory.add(Bytes::from_static(b"fresh")).await.unwrap();
        assert_eq!(next, FileLocation::new(last_id + 1, 12));
    }

    #[tokio::test]
    async fn initialize_retries_transient_open_failures() {
        let provider = Arc::new(InMemoryBackendProvider::new());
        provider.insert(0, FileHeader::EMPTY.encode().to_vec());
        provider.fail_next_opens(2);

        let directory = Directory::new(provider, StorageConfig::default());
        directory.initialize().await.unwrap();
        assert!(directory.contains_file(0));
    }

    #[tokio::test]
    async fn exhausted_retries_fail_initialize() {
        let provider = Arc::new(InMemoryBackendProvider::new());
        provider.insert(0, FileHeader::EMPTY.encode().to_vec());
        provider.fail_next_opens(3);

        let directory = Directory::new(provider, StorageConfig::default());
        assert!(directory.initialize().await.is_err());
        assert_eq!(directory.state(), LifecycleState::InitializeFailed);
        assert!(matches!(
            directory.add(Bytes::from_static(b"x")).await,
            Err(CoreError::InitializeFailed { .. })
        ));
    }

    #[derive(Debug, Default)]
    struct CountingProvider {
        inner: InMemoryBackendProvider,
        lists: AtomicU32,
        opens: AtomicU32,
    }

    impl BackendProvider for CountingProvider {
        fn root(&self) -> String {
            self.inner.root()
        }
        fn ensure_root(&self) -> StorageResult<()> {
            self.inner.ensure_root()
        }
        fn list(&self) -> StorageResult<Vec<u64>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list()
        }
        fn open(&self, id: u64) -> StorageResult<OpenedBackend> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.inner.open(id)
        }
        fn remove(&self, id: u64) -> StorageResult<()> {
            self.inner.remove(id)
        }
        fn location(&self, id: u64) -> String {
            self.inner.location(id)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_initialize_recovers_once() {
        let provider = Arc::new(CountingProvider::default());
        for id in [0, 1, 2] {
            provider.inner.insert(id, FileHeader::EMPTY.encode().to_vec());
        }
        let directory = Directory::new(provider.clone(), StorageConfig::default());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move { directory.initialize().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(provider.lists.load(Ordering::SeqCst), 1);
        assert_eq!(provider.opens.load(Ordering::SeqCst), 3);
        assert_eq!(directory.entry_files().len(), 3);
        assert_eq!(directory.id_generator().current(), 3);
    }

    #[tokio::test]
    async fn rollover_after_close_is_fenced() {
        let (provider, directory) = memory_directory(1 << 20);
        directory.add(Bytes::from_static(b"before")).await.unwrap();
        directory.close().await.unwrap();

        let err = directory.create_file(1).await.unwrap_err();
        assert!(err.is_fenced());
        let created = directory.files.read().get(&1).cloned().unwrap();
        assert_eq!(created.state(), LifecycleState::Fenced);
        assert!(FileHeader::decode(&provider.backend(1).unwrap().data())
            .unwrap()
            .is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn close_racing_adds_keeps_every_accepted_entry() {
        let (provider, directory) = memory_directory(256);

        let writers: Vec<_> = (0..8u32)
            .map(|w| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move {
                    let mut accepted = Vec::new();
                    for i in 0..200u32 {
                        let data = Bytes::from(format!("{w}:{i}"));
                        match directory.add(data.clone()).await {
                            Ok(location) => accepted.push((location, data)),
                            Err(e) => {
                                assert!(e.is_fenced(), "{e}");
                                break;
                            }
                        }
                        tokio::task::yield_now().await;
                    }
                    accepted
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(2)).await;
        directory.close().await.unwrap();
        assert!(directory
            .add(Bytes::from_static(b"late"))
            .await
            .unwrap_err()
            .is_fenced());

        let mut accepted = Vec::new();
        for writer in writers {
            accepted.extend(writer.await.unwrap());
        }

        let reopened = Directory::new(provider, StorageConfig::new().max_entry_file_size(256));
        reopened.initialize().await.unwrap();
        for (location, data) in &accepted {
            assert_eq!(&reopened.read_entry(*location).await.unwrap(), data);
        }
    }

    #[tokio::test]
    async fn corrupt_file_fails_initialize() {
        let provider = Arc::new(InMemoryBackendProvider::new());
        provider.insert(
            2,
            FileHeader {
                wrote: 30,
                flushed: 12,
            }
            .encode()
            .to_vec(),
        );

        let directory = Directory::new(provider, StorageConfig::default());
        let err = directory.initialize().await.unwrap_err();
        assert!(matches!(err.root_cause(), CoreError::InvalidFormat { .. }));
    }

    #[tokio::test]
    async fn close_fences_and_is_idempotent() {
        let (provider, directory) = memory_directory(1 << 20);
        directory.add(Bytes::from_static(b"pending")).await.unwrap();

        directory.close().await.unwrap();
        directory.close().await.unwrap();
        assert_eq!(directory.state(), LifecycleState::Fenced);
        assert!(directory
            .add(Bytes::from_static(b"late"))
            .await
            .unwrap_err()
            .is_fenced());
        assert!(directory.flush().await.unwrap_err().is_fenced());

        let header = FileHeader::decode(&provider.backend(0).unwrap().data()).unwrap();
        assert_eq!(header.flushed, 12 + 11);
    }

    #[tokio::test]
    async fn delete_removes_every_file() {
        let (provider, directory) = memory_directory(64);
        for _ in 0..5 {
            directory.add(Bytes::from(vec![0u8; 60])).await.unwrap();
        }
        assert_eq!(provider.list().unwrap().len(), 5);

        directory.delete().await.unwrap();
        assert!(provider.list().unwrap().is_empty());
        assert!(directory.entry_files().is_empty());
    }

    #[tokio::test]
    async fn used_sums_file_sizes() {
        let (_provider, directory) = memory_directory(64);
        directory.add(Bytes::from(vec![0u8; 60])).await.unwrap();
        directory.add(Bytes::from(vec![0u8; 10])).await.unwrap();
        assert_eq!(directory.used(), (12 + 64) + (12 + 14));
    }

    #[tokio::test]
    async fn shared_id_generator_spans_directories() {
        let ids = IdGenerator::new(10);
        let first = Directory::with_id_generator(
            Arc::new(InMemoryBackendProvider::new()),
            StorageConfig::default(),
            ids.clone(),
        );
        let second = Directory::with_id_generator(
            Arc::new(InMemoryBackendProvider::new()),
            StorageConfig::default(),
            ids.clone(),
        );

        let a = first.add(Bytes::from_static(b"a")).await.unwrap();
        let b = second.add(Bytes::from_static(b"b")).await.unwrap();
        assert_eq!(a.file_id, 10);
        assert_eq!(b.file_id, 11);
    }

    #[tokio::test]
    async fn periodic_flush_makes_entries_durable() {
        let provider = Arc::new(InMemoryBackendProvider::new());
        let config = StorageConfig::new().flush_interval(Duration::from_millis(10));
        let directory = Directory::new(provider.clone(), config);

        directory.add(Bytes::from_static(b"tick")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let header = FileHeader::decode(&provider.backend(0).unwrap().data()).unwrap();
        assert_eq!(header.flushed, 12 + 8);
        directory.close().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rollover_creates_unique_increasing_ids() {
        let (provider, directory) = memory_directory(256);

        let tasks: Vec<_> = (0..8u8)
            .map(|writer| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move {
                    let mut written = Vec::new();
                    for n in 0..50u8 {
                        let data = Bytes::from(vec![writer, n, 0, 0, 0, 0, 0, 0, 0, 0]);
                        let location = directory.add(data.clone()).await.unwrap();
                        written.push((location, data));
                    }
                    written
                })
            })
            .collect();

        let mut all = Vec::new();
        for task in tasks {
            all.extend(task.await.unwrap());
        }

        let unique: BTreeSet<FileLocation> = all.iter().map(|(location, _)| *location).collect();
        assert_eq!(unique.len(), all.len());

        let ids = provider.list().unwrap();
        let expected: Vec<u64> = (0..ids.len() as u64).collect();
        assert_eq!(ids, expected);
        assert_eq!(directory.id_generator().current(), ids.len() as u64);

        for (location, data) in all {
            assert_eq!(directory.read_entry(location).await.unwrap(), data);
        }
    }
}
