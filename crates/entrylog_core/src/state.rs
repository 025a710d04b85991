//! Lifecycle state shared by entry files and directories.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of an entry file or directory.
///
/// `New -> Initializing -> Initialized | InitializeFailed`, then
/// `Fenced` on close. `InitializeFailed` and `Fenced` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Constructed, nothing opened yet.
    New = 0,
    /// The single initialization attempt is running.
    Initializing = 1,
    /// Ready for reads and writes.
    Initialized = 2,
    /// Initialization failed; the instance is unusable.
    InitializeFailed = 3,
    /// Closed; no operation is admitted.
    Fenced = 4,
}

impl LifecycleState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::New,
            1 => Self::Initializing,
            2 => Self::Initialized,
            3 => Self::InitializeFailed,
            _ => Self::Fenced,
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::InitializeFailed | Self::Fenced)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::InitializeFailed => "initialize-failed",
            Self::Fenced => "fenced",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`LifecycleState`].
#[derive(Debug)]
pub(crate) struct AtomicLifecycle(AtomicU8);

impl AtomicLifecycle {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::New as u8))
    }

    /// Sequentially consistent so an admission check and a concurrent
    /// `fence` cannot both miss each other's write.
    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves from `current` to `new`; returns the observed state on failure.
    pub(crate) fn transition(
        &self,
        current: LifecycleState,
        new: LifecycleState,
    ) -> Result<(), LifecycleState> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from_u8)
    }

    /// Moves to `Fenced` from any other state. Returns false if already fenced.
    pub(crate) fn fence(&self) -> bool {
        self.0.swap(LifecycleState::Fenced as u8, Ordering::SeqCst) != LifecycleState::Fenced as u8
    }
}
