//! Rebuilding committed state from log records.

use crate::entry::EntryKey;
use crate::log::ChangeContainer;
use crate::types::TxnSeq;
use crate::wal::record::WalRecord;
use std::collections::BTreeMap;

/// A committed transaction found in the log and not yet flushed.
#[derive(Debug, Clone)]
pub struct RecoveredTxn<K> {
    /// Sequence number the transaction began with.
    pub seq: TxnSeq,
    /// Sequence number it committed with.
    pub commit: TxnSeq,
    /// Its containers in the order they were logged.
    pub containers: Vec<ChangeContainer<K>>,
}

/// Outcome of replaying the log.
#[derive(Debug, Clone)]
pub struct RecoveredLog<K> {
    /// Committed, unflushed transactions in ascending sequence order.
    pub transactions: Vec<RecoveredTxn<K>>,
    /// First sequence number free for new transactions.
    pub next_seq: TxnSeq,
    /// Number of records read.
    pub records: usize,
    /// Transactions whose batch had no commit record.
    pub discarded: usize,
}

impl<K> Default for RecoveredLog<K> {
    fn default() -> Self {
        Self {
            transactions: Vec::new(),
            next_seq: TxnSeq::new(1),
            records: 0,
            discarded: 0,
        }
    }
}

/// Accumulates records in log order.
#[derive(Debug)]
pub(crate) struct Replay<K> {
    pending: BTreeMap<TxnSeq, Vec<ChangeContainer<K>>>,
    committed: BTreeMap<TxnSeq, RecoveredTxn<K>>,
    max_seq: Option<TxnSeq>,
    records: usize,
}

impl<K: EntryKey> Replay<K> {
    pub(crate) fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            committed: BTreeMap::new(),
            max_seq: None,
            records: 0,
        }
    }

    pub(crate) fn apply(&mut self, record: WalRecord<K>) {
        self.records += 1;
        self.max_seq = self.max_seq.max(Some(record.max_seq()));
        match record {
            WalRecord::Changes { txn, container } => {
                self.pending.entry(txn).or_default().push(container);
            }
            WalRecord::Commit { txn, commit } => {
                let containers = self.pending.remove(&txn).unwrap_or_default();
                self.committed.insert(
                    txn,
                    RecoveredTxn {
                        seq: txn,
                        commit,
                        containers,
                    },
                );
            }
            WalRecord::Flushed { txn, .. } => {
                self.committed.remove(&txn);
                self.pending.remove(&txn);
            }
        }
    }

    pub(crate) fn finish(self) -> RecoveredLog<K> {
        RecoveredLog {
            transactions: self.committed.into_values().collect(),
            next_seq: self.max_seq.map_or(TxnSeq::new(1), TxnSeq::next),
            records: self.records,
            discarded: self.pending.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::IndexChange;

    fn changes(txn: u64, id: u64) -> WalRecord<u64> {
        WalRecord::Changes {
            txn: TxnSeq::new(txn),
            container: ChangeContainer::for_indices().with(IndexChange::add("cn", "x", id)),
        }
    }

    fn commit(txn: u64, at: u64) -> WalRecord<u64> {
        WalRecord::Commit {
            txn: TxnSeq::new(txn),
            commit: TxnSeq::new(at),
        }
    }

    #[test]
    fn empty_log_starts_at_one() {
        let log = Replay::<u64>::new().finish();
        assert!(log.transactions.is_empty());
        assert_eq!(log.next_seq, TxnSeq::new(1));
    }

    #[test]
    fn keeps_committed_in_sequence_order() {
        let mut replay = Replay::new();
        replay.apply(changes(4, 1));
        replay.apply(changes(2, 2));
        replay.apply(commit(4, 5));
        replay.apply(commit(2, 6));
        let log = replay.finish();

        let seqs: Vec<_> = log.transactions.iter().map(|t| t.seq.as_u64()).collect();
        assert_eq!(seqs, vec![2, 4]);
        assert_eq!(log.transactions[0].commit, TxnSeq::new(6));
        assert_eq!(log.next_seq, TxnSeq::new(7));
        assert_eq!(log.records, 4);
    }

    #[test]
    fn drops_uncommitted_and_flushed() {
        let mut replay = Replay::new();
        replay.apply(changes(1, 1));
        replay.apply(commit(1, 3));
        replay.apply(changes(2, 2));
        replay.apply(WalRecord::Flushed {
            txn: TxnSeq::new(1),
            last_seq: TxnSeq::new(6),
        });
        let log = replay.finish();

        assert!(log.transactions.is_empty());
        assert_eq!(log.discarded, 1);
        assert_eq!(log.next_seq, TxnSeq::new(7));
    }

    #[test]
    fn multiple_containers_stay_in_log_order() {
        let mut replay = Replay::new();
        replay.apply(changes(1, 10));
        replay.apply(changes(1, 11));
        replay.apply(commit(1, 2));
        let log = replay.finish();
        let ids: Vec<_> = log.transactions[0]
            .containers
            .iter()
            .flat_map(|c| c.index_changes().map(|i| i.id))
            .collect();
        assert_eq!(ids, vec![10, 11]);
    }
}
