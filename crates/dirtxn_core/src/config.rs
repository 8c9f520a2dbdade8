//! Engine configuration.

use dirtxn_storage::DEFAULT_BUFFER_SIZE;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a transaction manager and its write-ahead log.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the log files. `None` keeps the log in memory.
    pub log_dir: Option<PathBuf>,

    /// Size of the in-memory write buffer of each log file, in bytes.
    pub buffer_size: usize,

    /// Maximum size of a single log file before rotation, in bytes.
    pub max_log_file_size: u64,

    /// Whether to sync the log to stable storage on every commit.
    pub sync_on_commit: bool,

    /// How often the background flusher runs (zero = never).
    pub flush_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_log_file_size: 64 * 1024 * 1024, // 64 MB
            sync_on_commit: true,
            flush_interval: Duration::ZERO, // disabled
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Sets the write buffer size.
    #[must_use]
    pub const fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Sets the maximum log file size.
    #[must_use]
    pub const fn max_log_file_size(mut self, bytes: u64) -> Self {
        self.max_log_file_size = bytes;
        self
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the background flush interval.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
}
