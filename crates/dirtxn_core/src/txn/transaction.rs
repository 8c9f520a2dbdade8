//! Transaction handles.

use crate::entry::{EntryId, EntryKey};
use crate::error::{CoreError, CoreResult};
use crate::txn::record::TxnRecord;
use crate::txn::registry::Registry;
use crate::types::{TxnSeq, TxnState};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A transaction returned by [`crate::TxnManager::begin`].
///
/// The handle carries the transaction's sequence number, its read-only
/// flag and the to-check snapshot captured at begin: every registered
/// read-write transaction at that instant, itself included for a read-write
/// transaction. The snapshot never changes afterwards.
///
/// Dropping a handle that is still active aborts the transaction.
pub struct Transaction<K: EntryKey = EntryId> {
    record: Arc<TxnRecord<K>>,
    to_check: Arc<[Arc<TxnRecord<K>>]>,
    registry: Arc<Mutex<Registry<K>>>,
}

impl<K: EntryKey> Transaction<K> {
    pub(crate) fn new(
        record: Arc<TxnRecord<K>>,
        to_check: Arc<[Arc<TxnRecord<K>>]>,
        registry: Arc<Mutex<Registry<K>>>,
    ) -> Self {
        Self {
            record,
            to_check,
            registry,
        }
    }

    /// Returns the sequence number allocated at begin.
    #[must_use]
    pub fn seq(&self) -> TxnSeq {
        self.record.seq()
    }

    /// Returns true for read-only transactions.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.record.is_read_only()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TxnState {
        self.record.state()
    }

    /// Returns true while the transaction accepts operations.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == TxnState::Active
    }

    /// Returns the commit sequence number once committed.
    #[must_use]
    pub fn commit_seq(&self) -> Option<TxnSeq> {
        self.record.commit_seq()
    }

    /// Sequence numbers of the to-check snapshot, ascending.
    #[must_use]
    pub fn transactions_to_check(&self) -> Vec<TxnSeq> {
        self.to_check.iter().map(|r| r.seq()).collect()
    }

    pub(crate) fn record(&self) -> &Arc<TxnRecord<K>> {
        &self.record
    }

    /// Records whose changes this transaction sees, ascending by sequence:
    /// its own, plus every to-check peer that committed before it began.
    pub(crate) fn visible_records(&self) -> impl Iterator<Item = &Arc<TxnRecord<K>>> {
        let seq = self.seq();
        self.to_check
            .iter()
            .filter(move |r| r.seq() == seq || r.visible_at(seq))
    }

    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state() {
            TxnState::Active => Ok(()),
            state => Err(CoreError::TransactionNotActive {
                txn: self.seq(),
                state,
            }),
        }
    }

    pub(crate) fn belongs_to(&self, registry: &Arc<Mutex<Registry<K>>>) -> bool {
        Arc::ptr_eq(&self.registry, registry)
    }
}

impl<K: EntryKey> fmt::Debug for Transaction<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("seq", &self.seq())
            .field("read_only", &self.is_read_only())
            .field("state", &self.state())
            .field("to_check", &self.transactions_to_check())
            .finish()
    }
}

impl<K: EntryKey> Drop for Transaction<K> {
    fn drop(&mut self) {
        if self.record.state() == TxnState::Active {
            self.registry.lock().remove(self.seq());
            self.record.mark_aborted();
            debug!(txn = %self.seq(), "active transaction dropped, aborted");
        }
    }
}
