//! Transaction statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a [`crate::TxnManager`].
///
/// All counters are atomic and only ever increase; read them through
/// [`TxnStats::snapshot`].
#[derive(Debug, Default)]
pub struct TxnStats {
    begun: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
    conflicts: AtomicU64,
    flushed: AtomicU64,
    wal_bytes: AtomicU64,
}

impl TxnStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_begin(&self) {
        self.begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// A conflict also counts as an abort.
    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed(&self, transactions: u64) {
        self.flushed.fetch_add(transactions, Ordering::Relaxed);
    }

    pub(crate) fn record_wal_bytes(&self, bytes: u64) {
        self.wal_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            begun: self.begun.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
            wal_bytes: self.wal_bytes.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`TxnStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Transactions begun, read-only included.
    pub begun: u64,
    /// Transactions committed, read-only included.
    pub committed: u64,
    /// Transactions aborted, conflicts and log failures included.
    pub aborted: u64,
    /// Commits rejected by conflict detection.
    pub conflicts: u64,
    /// Transactions applied to the base store and reclaimed.
    pub flushed: u64,
    /// Bytes appended to the write-ahead log.
    pub wal_bytes: u64,
}
