//! Crash recovery testing.
//!
//! [`CrashableVolume`] wraps a [`MemoryVolume`] and can be told to "crash"
//! after a number of further bytes: the append that crosses the limit
//! writes only the bytes before it, and every write after that fails. The
//! bytes already written stay in the inner volume, so opening a new
//! manager over [`CrashableVolume::inner`] shows what recovery makes of
//! them.
//!
//! ## Scenarios
//!
//! 1. **Committed data survives** - a restart replays every commit
//! 2. **Crash before the log write** - the commit fails and leaves no trace
//! 3. **Crash inside a batch** - the torn record makes recovery fail
//! 4. **Failed sync** - the commit is reported failed and rolled back
//!
//! ```rust
//! use dirtxn_testkit::crash::CrashRecoveryHarness;
//!
//! let mut harness = CrashRecoveryHarness::new();
//! harness.run_all();
//! assert!(harness.all_passed());
//! ```

use crate::fixtures::{commit_entry, PARTITION};
use dirtxn_core::{Config, CoreResult, TxnManager, TxnSession};
use dirtxn_storage::{LogVolume, MemoryVolume, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Result of one crash recovery check.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the check passed.
    pub passed: bool,
    /// What was checked.
    pub description: String,
    /// Committed transactions expected after recovery.
    pub expected_txns: usize,
    /// Committed transactions found after recovery.
    pub actual_txns: usize,
    /// Why the check failed.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Creates a passing result.
    #[must_use]
    pub fn pass(description: &str, txns: usize) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            expected_txns: txns,
            actual_txns: txns,
            error: None,
        }
    }

    /// Creates a failing result.
    #[must_use]
    pub fn fail(description: &str, expected: usize, actual: usize, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            expected_txns: expected,
            actual_txns: actual,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug)]
struct CrashState {
    crash_at: AtomicU64,
    written: AtomicU64,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
}

impl Default for CrashState {
    fn default() -> Self {
        Self {
            crash_at: AtomicU64::new(u64::MAX),
            written: AtomicU64::new(0),
            crashed: AtomicBool::new(false),
            fail_on_sync: AtomicBool::new(false),
        }
    }
}

fn simulated(message: &str) -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, message.to_string()))
}

/// A log volume that can simulate crashes.
#[derive(Debug, Clone, Default)]
pub struct CrashableVolume {
    inner: Arc<MemoryVolume>,
    state: Arc<CrashState>,
}

impl CrashableVolume {
    /// Creates a volume over a fresh [`MemoryVolume`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped volume; it keeps every byte written before the
    /// crash.
    #[must_use]
    pub fn inner(&self) -> Arc<MemoryVolume> {
        Arc::clone(&self.inner)
    }

    /// Crashes once `bytes` more bytes have been written.
    pub fn crash_after(&self, bytes: u64) {
        let written = self.state.written.load(Ordering::SeqCst);
        self.state
            .crash_at
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Makes every sync fail.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.state.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Clears the crash state.
    pub fn reset(&self) {
        self.state.crash_at.store(u64::MAX, Ordering::SeqCst);
        self.state.crashed.store(false, Ordering::SeqCst);
        self.state.fail_on_sync.store(false, Ordering::SeqCst);
    }

    /// Returns true once a simulated crash happened.
    #[must_use]
    pub fn has_crashed(&self) -> bool {
        self.state.crashed.load(Ordering::SeqCst)
    }

    /// Total bytes appended through this volume.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.state.written.load(Ordering::SeqCst)
    }

    /// Returns this volume as a trait object for [`TxnManager::with_volume`].
    #[must_use]
    pub fn as_log_volume(&self) -> Arc<dyn LogVolume> {
        Arc::new(self.clone())
    }
}

impl LogVolume for CrashableVolume {
    fn segments(&self) -> StorageResult<Vec<u64>> {
        self.inner.segments()
    }

    fn open_segment(&self, number: u64) -> StorageResult<Box<dyn StorageBackend>> {
        if self.has_crashed() {
            return Err(simulated("simulated crash, volume unavailable"));
        }
        Ok(Box::new(CrashableBackend {
            inner: self.inner.open_segment(number)?,
            state: Arc::clone(&self.state),
        }))
    }

    fn remove_segment(&self, number: u64) -> StorageResult<()> {
        self.inner.remove_segment(number)
    }
}

/// One segment of a [`CrashableVolume`].
struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    state: Arc<CrashState>,
}

impl CrashableBackend {
    fn check_sync(&self, operation: &str) -> StorageResult<()> {
        if self.state.fail_on_sync.load(Ordering::SeqCst) {
            return Err(simulated(&format!("simulated failure during {operation}")));
        }
        Ok(())
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        if self.state.crashed.load(Ordering::SeqCst) {
            return Err(simulated("simulated crash, write after crash"));
        }
        let len = bytes.len() as u64;
        let current = self.state.written.load(Ordering::SeqCst);
        let crash_at = self.state.crash_at.load(Ordering::SeqCst);

        if current.saturating_add(len) > crash_at {
            self.state.crashed.store(true, Ordering::SeqCst);
            let partial = usize::try_from(crash_at.saturating_sub(current)).unwrap_or(bytes.len());
            if partial > 0 {
                self.inner.append(&bytes[..partial])?;
                self.state.written.fetch_add(partial as u64, Ordering::SeqCst);
            }
            return Err(simulated("simulated crash during write"));
        }

        let offset = self.inner.append(bytes)?;
        self.state.written.fetch_add(len, Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.check_sync("sync")?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

/// Runs the crash scenarios and collects their results.
#[derive(Debug, Default)]
pub struct CrashRecoveryHarness {
    /// Results in the order the checks ran.
    pub results: Vec<CrashRecoveryResult>,
}

impl CrashRecoveryHarness {
    /// Creates an empty harness.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every scenario.
    pub fn run_all(&mut self) -> &[CrashRecoveryResult] {
        let checks = [
            check_committed_data_survives(10),
            check_crash_before_write(3),
            check_torn_batch_fails_recovery(),
            check_failed_sync_rolls_back(),
        ];
        self.results.extend(checks);
        &self.results
    }

    /// Returns true when every recorded check passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Prints one line per check.
    pub fn print_summary(&self) {
        for result in &self.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            println!(
                "[{status}] {} ({}/{} transactions){}",
                result.description,
                result.actual_txns,
                result.expected_txns,
                result.error.as_deref().map(|e| format!(": {e}")).unwrap_or_default()
            );
        }
    }
}

fn open(volume: Arc<dyn LogVolume>, config: Config) -> CoreResult<TxnManager<u64>> {
    TxnManager::with_volume(PARTITION, config, volume)
}

fn reopen_inner(volume: &CrashableVolume) -> CoreResult<TxnManager<u64>> {
    let inner: Arc<dyn LogVolume> = volume.inner();
    open(inner, Config::new())
}

fn visible_count(manager: Arc<TxnManager<u64>>, ids: impl IntoIterator<Item = u64>) -> CoreResult<usize> {
    let mut session = TxnSession::new(manager);
    session.begin(true)?;
    let mut count = 0;
    for id in ids {
        if session.merge_updates(PARTITION, &id, None)?.is_some() {
            count += 1;
        }
    }
    session.commit()?;
    Ok(count)
}

/// Commits `count` transactions, restarts and checks they are all back.
#[must_use]
pub fn check_committed_data_survives(count: u64) -> CrashRecoveryResult {
    const DESC: &str = "committed data survives a restart";
    let expected = usize::try_from(count).unwrap_or(usize::MAX);
    let run = || -> CoreResult<usize> {
        let volume = CrashableVolume::new();
        let manager = open(volume.as_log_volume(), Config::new())?;
        for id in 0..count {
            commit_entry(&manager, id, &format!("cn=user{id}"))?;
        }
        drop(manager);
        let recovered = Arc::new(reopen_inner(&volume)?);
        visible_count(recovered, 0..count)
    };
    match run() {
        Ok(actual) if actual == expected => CrashRecoveryResult::pass(DESC, actual),
        Ok(actual) => CrashRecoveryResult::fail(DESC, expected, actual, "entries missing after recovery"),
        Err(e) => CrashRecoveryResult::fail(DESC, expected, 0, &e.to_string()),
    }
}

/// Commits `before` transactions, crashes on the next commit's first byte
/// and checks recovery sees exactly the first `before`.
#[must_use]
pub fn check_crash_before_write(before: u64) -> CrashRecoveryResult {
    const DESC: &str = "commit failing before the log write leaves no trace";
    let expected = usize::try_from(before).unwrap_or(usize::MAX);
    let run = || -> CoreResult<(usize, bool)> {
        let volume = CrashableVolume::new();
        let manager = open(volume.as_log_volume(), Config::new())?;
        for id in 0..before {
            commit_entry(&manager, id, &format!("cn=user{id}"))?;
        }
        volume.crash_after(0);
        let failed = commit_entry(&manager, before, "cn=lost").is_err();
        drop(manager);

        let recovered = Arc::new(reopen_inner(&volume)?);
        Ok((visible_count(recovered, 0..=before)?, failed))
    };
    match run() {
        Ok((actual, true)) if actual == expected => CrashRecoveryResult::pass(DESC, actual),
        Ok((actual, false)) => CrashRecoveryResult::fail(DESC, expected, actual, "commit did not fail"),
        Ok((actual, true)) => CrashRecoveryResult::fail(DESC, expected, actual, "wrong entries after recovery"),
        Err(e) => CrashRecoveryResult::fail(DESC, expected, 0, &e.to_string()),
    }
}

/// Crashes in the middle of a commit batch and checks that recovery
/// refuses the torn log instead of guessing.
#[must_use]
pub fn check_torn_batch_fails_recovery() -> CrashRecoveryResult {
    const DESC: &str = "torn batch fails recovery";
    let volume = CrashableVolume::new();
    let setup = || -> CoreResult<bool> {
        let manager = open(volume.as_log_volume(), Config::new())?;
        commit_entry(&manager, 1, "cn=one")?;
        volume.crash_after(10);
        Ok(commit_entry(&manager, 2, "cn=two").is_err())
    };
    match setup() {
        Ok(true) => {}
        Ok(false) => return CrashRecoveryResult::fail(DESC, 0, 0, "commit did not fail"),
        Err(e) => return CrashRecoveryResult::fail(DESC, 0, 0, &e.to_string()),
    }
    match reopen_inner(&volume) {
        Err(e) if e.is_invalid_log_state() => CrashRecoveryResult::pass(DESC, 0),
        Err(e) => CrashRecoveryResult::fail(DESC, 0, 0, &format!("unexpected error: {e}")),
        Ok(manager) => CrashRecoveryResult::fail(
            DESC,
            0,
            manager.registered().len(),
            "recovery accepted a torn log",
        ),
    }
}

/// Fails the sync of a commit and checks the transaction is reported
/// failed and invisible to later readers.
#[must_use]
pub fn check_failed_sync_rolls_back() -> CrashRecoveryResult {
    const DESC: &str = "failed sync rolls the commit back";
    let run = || -> CoreResult<Result<usize, String>> {
        let volume = CrashableVolume::new();
        let manager = Arc::new(open(volume.as_log_volume(), Config::new().sync_on_commit(true))?);
        commit_entry(&manager, 1, "cn=one")?;
        volume.set_fail_on_sync(true);
        if commit_entry(&manager, 2, "cn=two").is_ok() {
            return Ok(Err("commit reported success".to_string()));
        }
        volume.set_fail_on_sync(false);
        if manager.registered().len() != 1 {
            return Ok(Err("failed transaction still registered".to_string()));
        }
        Ok(Ok(visible_count(manager, [1, 2])?))
    };
    match run() {
        Ok(Ok(1)) => CrashRecoveryResult::pass(DESC, 1),
        Ok(Ok(actual)) => CrashRecoveryResult::fail(DESC, 1, actual, "failed commit is visible"),
        Ok(Err(message)) => CrashRecoveryResult::fail(DESC, 1, 0, &message),
        Err(e) => CrashRecoveryResult::fail(DESC, 1, 0, &e.to_string()),
    }
}
