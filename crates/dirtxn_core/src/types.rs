//! Core type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction sequence number.
///
/// One counter hands out both begin and commit sequence numbers, so the
/// values give a total order over every begin and commit in the manager.
/// Sequence numbers are strictly increasing and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TxnSeq(pub u64);

impl TxnSeq {
    /// Creates a sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TxnSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Lifecycle state of a transaction.
///
/// `Active -> {Committed, Aborted}`; a committed read-write transaction
/// moves on to `Reclaimed` once it has been flushed to the base store and
/// dropped from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnState {
    /// Accepting reads and writes.
    Active,
    /// Committed; changes visible to transactions that begin afterwards.
    Committed,
    /// Aborted; changes discarded.
    Aborted,
    /// Committed, flushed to the base store and removed from the registry.
    Reclaimed,
}

impl TxnState {
    /// Returns true for `Committed` and `Reclaimed`.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Committed | Self::Reclaimed)
    }
}
