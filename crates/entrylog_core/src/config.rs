//! Entry log configuration.

use std::time::Duration;

/// Configuration for entry files and directories.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Size threshold past which an entry file stops accepting writes.
    pub max_entry_file_size: u64,

    /// Pending bytes per file that force a flush on the next add.
    pub max_entry_cache_per_file: u64,

    /// How often a directory flushes in the background (0 = never).
    pub flush_interval: Duration,

    /// Attempts to reopen one existing file during directory recovery.
    pub open_retries: u32,

    /// Attempts to create one new file during rollover.
    pub create_retries: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_entry_file_size: 1024 * 1024 * 1024,   // 1 GB
            max_entry_cache_per_file: 64 * 1024 * 1024, // 64 MB
            flush_interval: Duration::ZERO,             // disabled
            open_retries: 3,
            create_retries: 3,
        }
    }
}

impl StorageConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry file size threshold.
    #[must_use]
    pub const fn max_entry_file_size(mut self, size: u64) -> Self {
        self.max_entry_file_size = size;
        self
    }

    /// Sets the per-file pending byte limit.
    #[must_use]
    pub const fn max_entry_cache_per_file(mut self, size: u64) -> Self {
        self.max_entry_cache_per_file = size;
        self
    }

    /// Sets the background flush interval.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets how many times recovery of one file is attempted.
    #[must_use]
    pub const fn open_retries(mut self, attempts: u32) -> Self {
        self.open_retries = attempts;
        self
    }

    /// Sets how many times creation of one file is attempted.
    #[must_use]
    pub const fn create_retries(mut self, attempts: u32) -> Self {
        self.create_retries = attempts;
        self
    }

    /// Size threshold clamped to what a 4-byte offset can address.
    pub(crate) fn threshold(&self) -> u64 {
        self.max_entry_file_size.min(u64::from(u32::MAX))
    }
}

/// Configuration for the position index.
#[derive(Debug, Clone, Default)]
pub struct IndexConfig {
    /// Whether every write is synced before returning.
    ///
    /// When false, writes become durable at the next `flush`.
    pub sync_on_write: bool,
}

impl IndexConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether every write is synced.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.max_entry_file_size, 1 << 30);
        assert_eq!(config.max_entry_cache_per_file, 64 << 20);
        assert_eq!(config.flush_interval, Duration::ZERO);
        assert_eq!(config.open_retries, 3);
        assert_eq!(config.create_retries, 3);
        assert!(!IndexConfig::default().sync_on_write);
    }

    #[test]
    fn builder_pattern() {
        let config = StorageConfig::new()
            .max_entry_file_size(2048)
            .max_entry_cache_per_file(512)
            .flush_interval(Duration::from_millis(50))
            .create_retries(1);

        assert_eq!(config.max_entry_file_size, 2048);
        assert_eq!(config.max_entry_cache_per_file, 512);
        assert_eq!(config.flush_interval, Duration::from_millis(50));
        assert_eq!(config.create_retries, 1);
        assert_eq!(config.open_retries, 3);
    }

    #[test]
    fn threshold_is_clamped() {
        let config = StorageConfig::new().max_entry_file_size(u64::MAX);
        assert_eq!(config.threshold(), u64::from(u32::MAX));
    }
}
