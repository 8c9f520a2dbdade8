//! The shared registry of read-write transactions.

use crate::entry::EntryKey;
use crate::txn::record::TxnRecord;
use crate::types::TxnSeq;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

/// Sequence counter, registered write transactions and active starts.
///
/// Guarded by one mutex in the manager. Every critical section is pointer
/// and list manipulation only.
#[derive(Debug)]
pub(crate) struct Registry<K> {
    next_seq: TxnSeq,
    /// Read-write transactions in begin order, hence in sequence order.
    records: VecDeque<Arc<TxnRecord<K>>>,
    /// Start sequence numbers of every active transaction.
    active: BTreeSet<TxnSeq>,
}

impl<K: EntryKey> Registry<K> {
    pub(crate) fn new(next_seq: TxnSeq) -> Self {
        Self {
            next_seq,
            records: VecDeque::new(),
            active: BTreeSet::new(),
        }
    }

    pub(crate) fn allocate(&mut self) -> TxnSeq {
        let seq = self.next_seq;
        self.next_seq = seq.next();
        seq
    }

    pub(crate) fn next_seq(&self) -> TxnSeq {
        self.next_seq
    }

    pub(crate) fn push(&mut self, record: Arc<TxnRecord<K>>) {
        self.records.push_back(record);
    }

    pub(crate) fn activate(&mut self, seq: TxnSeq) {
        self.active.insert(seq);
    }

    pub(crate) fn deactivate(&mut self, seq: TxnSeq) {
        self.active.remove(&seq);
    }

    /// Drops `seq` from both the registry and the active set.
    pub(crate) fn remove(&mut self, seq: TxnSeq) {
        self.records.retain(|r| r.seq() != seq);
        self.active.remove(&seq);
    }

    pub(crate) fn snapshot(&self) -> Arc<[Arc<TxnRecord<K>>]> {
        self.records.iter().cloned().collect()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &Arc<TxnRecord<K>>> {
        self.records.iter()
    }

    /// Oldest start of any active transaction, or the next sequence number
    /// when nothing is active. A commit below the horizon is visible to
    /// every active transaction.
    pub(crate) fn horizon(&self) -> TxnSeq {
        self.active.first().copied().unwrap_or(self.next_seq)
    }

    /// Oldest sequence number still registered. Log records mentioning only
    /// older sequence numbers are no longer needed.
    pub(crate) fn low_water(&self) -> TxnSeq {
        self.records.front().map_or(self.next_seq, |r| r.seq())
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_monotonic() {
        let mut reg: Registry<u64> = Registry::new(TxnSeq::new(5));
        assert_eq!(reg.allocate(), TxnSeq::new(5));
        assert_eq!(reg.allocate(), TxnSeq::new(6));
        assert_eq!(reg.next_seq(), TxnSeq::new(7));
    }

    #[test]
    fn horizon_and_low_water() {
        let mut reg: Registry<u64> = Registry::new(TxnSeq::new(1));
        assert_eq!(reg.horizon(), TxnSeq::new(1));
        assert_eq!(reg.low_water(), TxnSeq::new(1));

        let a = reg.allocate();
        reg.push(Arc::new(TxnRecord::new(a, false)));
        reg.activate(a);
        let b = reg.allocate();
        reg.activate(b);

        assert_eq!(reg.horizon(), a);
        assert_eq!(reg.low_water(), a);
        reg.deactivate(a);
        assert_eq!(reg.horizon(), b);
        assert_eq!(reg.low_water(), a);

        reg.remove(a);
        assert_eq!(reg.len(), 0);
        assert_eq!(reg.low_water(), TxnSeq::new(3));
        assert_eq!(reg.active_count(), 1);
    }
}
