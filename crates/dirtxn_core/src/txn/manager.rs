//! Transaction manager.

use crate::config::Config;
use crate::entry::{EntryId, EntryKey};
use crate::error::{CoreError, CoreResult};
use crate::log::{ChangeContainer, WriteSet};
use crate::stats::TxnStats;
use crate::store::PartitionStore;
use crate::txn::record::TxnRecord;
use crate::txn::registry::Registry;
use crate::txn::transaction::Transaction;
use crate::types::{TxnSeq, TxnState};
use crate::wal::{WalManager, WalRecord};
use dirtxn_storage::{FileVolume, LogVolume, MemoryVolume};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Coordinates the transactions of one partition.
///
/// The manager provides:
/// - Sequence numbers from a single counter shared by begins and commits
/// - Optimistic concurrency: conflicts are detected at commit, never by
///   blocking
/// - Durability through the write-ahead log
/// - Reclamation: [`TxnManager::flush`] moves committed changes into the
///   base store once every active transaction can see them
///
/// ## Locking
///
/// The registry lives behind one mutex that is only held for list and
/// counter manipulation. Log writes and base-store writes happen outside it.
pub struct TxnManager<K: EntryKey = EntryId> {
    partition: String,
    config: Config,
    registry: Arc<Mutex<Registry<K>>>,
    wal: WalManager<K>,
    /// At most one flush at a time.
    flush_lock: Mutex<()>,
    stats: TxnStats,
}

impl<K: EntryKey> TxnManager<K> {
    /// Opens the manager for `partition`.
    ///
    /// The log lives under `config.log_dir`, or in memory when no directory
    /// is configured. Recovery runs before this returns.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the log directory cannot be opened or is
    /// locked by another process, and [`CoreError::InvalidLogState`] or
    /// [`CoreError::ChecksumMismatch`] if the log is damaged.
    pub fn open(partition: impl Into<String>, config: Config) -> CoreResult<Self> {
        let volume: Arc<dyn LogVolume> = match &config.log_dir {
            Some(dir) => Arc::new(FileVolume::open(dir, config.buffer_size)?),
            None => Arc::new(MemoryVolume::new()),
        };
        Self::with_volume(partition, config, volume)
    }

    /// Opens the manager on a caller-supplied log volume.
    ///
    /// Committed transactions found in the log without a flush marker are
    /// registered again in state `Committed`, and the sequence counter
    /// resumes after the highest recorded value.
    ///
    /// # Errors
    ///
    /// Same as [`TxnManager::open`].
    pub fn with_volume(
        partition: impl Into<String>,
        config: Config,
        volume: Arc<dyn LogVolume>,
    ) -> CoreResult<Self> {
        let (wal, recovered) = WalManager::open(volume, &config)?;

        let mut registry = Registry::new(recovered.next_seq);
        for txn in recovered.transactions {
            let record = TxnRecord::recovered(txn.seq, txn.commit, txn.containers)?;
            registry.push(Arc::new(record));
        }

        Ok(Self {
            partition: partition.into(),
            config,
            registry: Arc::new(Mutex::new(registry)),
            wal,
            flush_lock: Mutex::new(()),
            stats: TxnStats::new(),
        })
    }

    /// Begins a transaction.
    ///
    /// A read-write transaction is appended to the registry first, so its
    /// to-check snapshot ends with itself. A read-only transaction is never
    /// registered; its snapshot is the registry as it stands.
    ///
    /// # Errors
    ///
    /// Currently infallible; the signature leaves room for log setup errors.
    pub fn begin(&self, read_only: bool) -> CoreResult<Transaction<K>> {
        let (record, to_check) = {
            let mut registry = self.registry.lock();
            let seq = registry.allocate();
            let record = Arc::new(TxnRecord::new(seq, read_only));
            if !read_only {
                registry.push(Arc::clone(&record));
            }
            registry.activate(seq);
            (record, registry.snapshot())
        };

        self.stats.record_begin();
        trace!(txn = %record.seq(), read_only, to_check = to_check.len(), "transaction begun");
        Ok(Transaction::new(record, to_check, Arc::clone(&self.registry)))
    }

    /// Stages a change container on `txn`.
    ///
    /// With `is_index_change` the container must carry no target and only
    /// index edits; otherwise it must name the entry it changes. A second
    /// container for the same entry is appended after the first.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReadOnlyTransaction`],
    /// [`CoreError::TransactionNotActive`], [`CoreError::ForeignTransaction`]
    /// or [`CoreError::InvalidContainer`].
    pub fn log(
        &self,
        txn: &Transaction<K>,
        container: ChangeContainer<K>,
        is_index_change: bool,
    ) -> CoreResult<()> {
        self.ensure_owned(txn)?;
        txn.ensure_active()?;
        if txn.is_read_only() {
            return Err(CoreError::ReadOnlyTransaction { txn: txn.seq() });
        }
        txn.record().stage(container, is_index_change)
    }

    /// Commits `txn` and returns its commit sequence number.
    ///
    /// A read-only transaction just ends. A read-write transaction is
    /// checked against every peer that committed after it began; if none
    /// wrote the same entry or index pair it is marked committed under the
    /// registry lock, and its containers plus a commit marker are then
    /// written to the log as one batch.
    ///
    /// # Errors
    ///
    /// - [`CoreError::TransactionConflict`]: a peer wrote the same data. The
    ///   transaction is aborted.
    /// - A storage error from the log. The transaction is aborted and its
    ///   changes discarded.
    /// - [`CoreError::TransactionNotActive`] or
    ///   [`CoreError::ForeignTransaction`] for misuse.
    pub fn commit(&self, txn: &mut Transaction<K>) -> CoreResult<TxnSeq> {
        self.ensure_owned(txn)?;
        txn.ensure_active()?;

        let seq = txn.seq();
        let record = Arc::clone(txn.record());

        if record.is_read_only() {
            self.registry.lock().deactivate(seq);
            record.mark_committed(seq, WriteSet::default());
            self.stats.record_commit();
            debug!(txn = %seq, "read-only transaction committed");
            return Ok(seq);
        }

        let writes = record.write_set();
        let commit = {
            let mut registry = self.registry.lock();
            let peer = registry
                .records()
                .filter(|peer| peer.seq() != seq)
                .find(|peer| peer.conflicts_with(seq, &writes))
                .map(|peer| peer.seq());

            if let Some(peer) = peer {
                registry.remove(seq);
                drop(registry);
                record.mark_aborted();
                self.stats.record_conflict();
                warn!(txn = %seq, peer = %peer, "commit rejected, write conflict");
                return Err(CoreError::TransactionConflict { txn: seq, peer });
            }

            let commit = registry.allocate();
            record.mark_committed(commit, writes);
            registry.deactivate(seq);
            commit
        };

        let mut batch: Vec<WalRecord<K>> = record.with_changes(|changes| {
            changes
                .containers()
                .map(|container| WalRecord::Changes {
                    txn: seq,
                    container: container.clone(),
                })
                .collect()
        });
        batch.push(WalRecord::Commit { txn: seq, commit });

        match self.wal.append_batch(&batch, self.wal.sync_on_commit()) {
            Ok(bytes) => {
                record.mark_durable();
                self.stats.record_wal_bytes(bytes);
                self.stats.record_commit();
                debug!(txn = %seq, commit = %commit, containers = batch.len() - 1, bytes, "transaction committed");
                Ok(commit)
            }
            Err(err) => {
                warn!(txn = %seq, error = %err, "commit failed writing the log, aborting");
                self.registry.lock().remove(seq);
                record.mark_aborted();
                self.stats.record_abort();
                Err(err)
            }
        }
    }

    /// Aborts `txn`, discarding its staged changes.
    ///
    /// Aborting an already aborted transaction does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TransactionNotActive`] for a committed
    /// transaction and [`CoreError::ForeignTransaction`] for a handle from
    /// another manager.
    pub fn abort(&self, txn: &mut Transaction<K>) -> CoreResult<()> {
        self.ensure_owned(txn)?;
        match txn.state() {
            TxnState::Aborted => Ok(()),
            TxnState::Active => {
                let seq = txn.seq();
                self.registry.lock().remove(seq);
                txn.record().mark_aborted();
                self.stats.record_abort();
                debug!(txn = %seq, "transaction aborted");
                Ok(())
            }
            state => Err(CoreError::TransactionNotActive {
                txn: txn.seq(),
                state,
            }),
        }
    }

    /// Moves committed transactions into `store` and reclaims them.
    ///
    /// A transaction is flushed once its commit precedes the start of every
    /// active transaction, so no reader can miss it. Transactions are taken
    /// from the front of the registry in order and the scan stops at the
    /// first one that does not qualify. After applying them the manager
    /// writes a flush marker per transaction, drops them from the registry
    /// and deletes log files nobody needs any more.
    ///
    /// Returns the number of transactions flushed.
    ///
    /// # Errors
    ///
    /// Returns the first store or log error. Transactions applied before the
    /// error stay registered and are applied again by the next flush.
    pub fn flush<S>(&self, store: &S) -> CoreResult<usize>
    where
        S: PartitionStore<K> + ?Sized,
    {
        let _flushing = self.flush_lock.lock();

        let (ready, last_seq) = {
            let registry = self.registry.lock();
            let horizon = registry.horizon();
            let ready: Vec<Arc<TxnRecord<K>>> = registry
                .records()
                .take_while(|record| record.flushable_before(horizon))
                .cloned()
                .collect();
            (ready, TxnSeq::new(registry.next_seq().as_u64().saturating_sub(1)))
        };
        if ready.is_empty() {
            return Ok(0);
        }

        for record in &ready {
            record.with_changes(|changes| {
                changes
                    .containers()
                    .try_for_each(|container| store.apply(container))
            })?;
        }

        let markers: Vec<WalRecord<K>> = ready
            .iter()
            .map(|record| WalRecord::Flushed {
                txn: record.seq(),
                last_seq,
            })
            .collect();
        let bytes = self.wal.append_batch(&markers, self.wal.sync_on_commit())?;
        self.stats.record_wal_bytes(bytes);

        let low_water = {
            let mut registry = self.registry.lock();
            for record in &ready {
                registry.remove(record.seq());
                record.mark_reclaimed();
            }
            registry.low_water()
        };
        let purged = self.wal.purge(low_water)?;

        self.stats.record_flushed(ready.len() as u64);
        debug!(
            flushed = ready.len(),
            low_water = %low_water,
            purged = purged.len(),
            "committed transactions flushed"
        );
        Ok(ready.len())
    }

    /// Sequence numbers of the registered read-write transactions, ascending.
    #[must_use]
    pub fn registered(&self) -> Vec<TxnSeq> {
        self.registry.lock().records().map(|r| r.seq()).collect()
    }

    /// Number of active transactions, read-only ones included.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.registry.lock().active_count()
    }

    /// The next sequence number to be handed out.
    #[must_use]
    pub fn next_seq(&self) -> TxnSeq {
        self.registry.lock().next_seq()
    }

    /// Returns the statistics counters.
    #[must_use]
    pub fn stats(&self) -> &TxnStats {
        &self.stats
    }

    /// Returns the partition name.
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the write-ahead log.
    #[must_use]
    pub fn wal(&self) -> &WalManager<K> {
        &self.wal
    }

    /// Checks that `partition` is the one this manager serves.
    pub(crate) fn ensure_partition(&self, partition: &str) -> CoreResult<()> {
        if partition == self.partition {
            Ok(())
        } else {
            Err(CoreError::UnknownPartition {
                name: partition.to_string(),
            })
        }
    }

    pub(crate) fn ensure_owned(&self, txn: &Transaction<K>) -> CoreResult<()> {
        if txn.belongs_to(&self.registry) {
            Ok(())
        } else {
            Err(CoreError::ForeignTransaction { txn: txn.seq() })
        }
    }
}

impl<K: EntryKey> fmt::Debug for TxnManager<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxnManager")
            .field("partition", &self.partition)
            .field("registered", &self.registered())
            .field("active_count", &self.active_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, Modification, Value};
    use crate::log::{IndexChange, LogEdit};
    use crate::store::MemoryPartition;
    use dirtxn_storage::{StorageBackend, StorageError, StorageResult};

    const PARTITION: &str = "dc=example";

    fn manager() -> TxnManager<u64> {
        TxnManager::open(PARTITION, Config::new()).unwrap()
    }

    fn add_entry(id: u64, cn: &str) -> ChangeContainer<u64> {
        ChangeContainer::for_entry(id)
            .with(LogEdit::add_entry(Entry::new(format!("cn={cn},{PARTITION}")).with("cn", [cn])))
            .with(IndexChange::add("cn", cn, id))
    }

    fn write(tm: &TxnManager<u64>, container: ChangeContainer<u64>) -> CoreResult<TxnSeq> {
        let mut txn = tm.begin(false)?;
        tm.log(&txn, container, false)?;
        tm.commit(&mut txn)
    }

    #[test]
    fn begin_allocates_increasing_sequence_numbers() {
        let tm = manager();
        let a = tm.begin(false).unwrap();
        let b = tm.begin(true).unwrap();
        assert!(a.seq() < b.seq());
        assert_eq!(tm.active_count(), 2);
        assert_eq!(tm.registered(), vec![a.seq()]);
    }

    #[test]
    fn read_write_snapshot_ends_with_itself() {
        let tm = manager();
        let a = tm.begin(false).unwrap();
        let b = tm.begin(false).unwrap();
        assert_eq!(a.transactions_to_check(), vec![a.seq()]);
        assert_eq!(b.transactions_to_check(), vec![a.seq(), b.seq()]);
    }

    #[test]
    fn dependency_list_example() {
        let tm = manager();
        let mut txn1 = tm.begin(false).unwrap();
        tm.log(&txn1, add_entry(1, "one"), false).unwrap();
        tm.commit(&mut txn1).unwrap();
        let mut txn2 = tm.begin(false).unwrap();
        tm.log(&txn2, add_entry(2, "two"), false).unwrap();
        tm.commit(&mut txn2).unwrap();

        let mut txn3 = tm.begin(true).unwrap();
        let list3 = txn3.transactions_to_check();
        assert!(list3.contains(&txn1.seq()));
        assert!(list3.contains(&txn2.seq()));
        assert!(!list3.contains(&txn3.seq()));
        tm.commit(&mut txn3).unwrap();

        let txn4 = tm.begin(false).unwrap();
        let list4 = txn4.transactions_to_check();
        assert_eq!(list4, vec![txn1.seq(), txn2.seq(), txn4.seq()]);
        assert!(!list4.contains(&txn3.seq()));
    }

    #[test]
    fn snapshot_does_not_change_after_begin() {
        let tm = manager();
        let reader = tm.begin(true).unwrap();
        let _writer = tm.begin(false).unwrap();
        assert!(reader.transactions_to_check().is_empty());
    }

    #[test]
    fn read_only_cannot_log() {
        let tm = manager();
        let txn = tm.begin(true).unwrap();
        let err = tm.log(&txn, add_entry(1, "x"), false).unwrap_err();
        assert!(matches!(err, CoreError::ReadOnlyTransaction { .. }));
    }

    #[test]
    fn invalid_index_container_is_rejected() {
        let tm = manager();
        let txn = tm.begin(false).unwrap();
        let err = tm.log(&txn, add_entry(1, "x"), true).unwrap_err();
        assert!(matches!(err, CoreError::InvalidContainer { .. }));
        let err = tm
            .log(&txn, ChangeContainer::for_indices().with(IndexChange::add("cn", "x", 1)), false)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidContainer { .. }));
        tm.log(&txn, ChangeContainer::for_indices().with(IndexChange::add("cn", "x", 1)), true)
            .unwrap();
    }

    #[test]
    fn commit_assigns_fresh_sequence_number() {
        let tm = manager();
        let mut txn = tm.begin(false).unwrap();
        tm.log(&txn, add_entry(1, "x"), false).unwrap();
        let other = tm.begin(true).unwrap();
        let commit = tm.commit(&mut txn).unwrap();
        assert!(commit > other.seq());
        assert_eq!(txn.state(), TxnState::Committed);
        assert_eq!(txn.commit_seq(), Some(commit));
        assert_eq!(tm.registered(), vec![txn.seq()]);
    }

    #[test]
    fn read_only_commit_just_ends() {
        let tm = manager();
        let mut txn = tm.begin(true).unwrap();
        assert_eq!(tm.commit(&mut txn).unwrap(), txn.seq());
        assert_eq!(tm.active_count(), 0);
        assert!(tm.registered().is_empty());
        assert_eq!(tm.wal().current_size(), 0);
    }

    #[test]
    fn cannot_commit_twice() {
        let tm = manager();
        let mut txn = tm.begin(false).unwrap();
        tm.commit(&mut txn).unwrap();
        let err = tm.commit(&mut txn).unwrap_err();
        assert!(matches!(
            err,
            CoreError::TransactionNotActive {
                state: TxnState::Committed,
                ..
            }
        ));
        assert!(tm.abort(&mut txn).is_err());
    }

    #[test]
    fn abort_removes_from_registry_and_is_idempotent() {
        let tm = manager();
        let mut txn = tm.begin(false).unwrap();
        tm.log(&txn, add_entry(1, "x"), false).unwrap();
        tm.abort(&mut txn).unwrap();
        assert_eq!(txn.state(), TxnState::Aborted);
        assert!(tm.registered().is_empty());
        assert_eq!(tm.active_count(), 0);
        tm.abort(&mut txn).unwrap();
        assert!(tm.log(&txn, add_entry(1, "x"), false).is_err());
        assert_eq!(tm.wal().current_size(), 0);
    }

    #[test]
    fn same_entry_writers_conflict() {
        let tm = manager();
        let mut a = tm.begin(false).unwrap();
        let mut b = tm.begin(false).unwrap();
        tm.log(&a, add_entry(7, "a"), false).unwrap();
        tm.log(&b, add_entry(7, "b"), false).unwrap();

        tm.commit(&mut a).unwrap();
        let err = tm.commit(&mut b).unwrap_err();
        assert!(err.is_conflict());
        match err {
            CoreError::TransactionConflict { txn, peer } => {
                assert_eq!(txn, b.seq());
                assert_eq!(peer, a.seq());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(b.state(), TxnState::Aborted);
        assert_eq!(tm.registered(), vec![a.seq()]);

        let snapshot = tm.stats().snapshot();
        assert_eq!(snapshot.committed, 1);
        assert_eq!(snapshot.conflicts, 1);
        assert_eq!(snapshot.aborted, 1);
    }

    #[test]
    fn disjoint_writers_do_not_conflict() {
        let tm = manager();
        let mut a = tm.begin(false).unwrap();
        let mut b = tm.begin(false).unwrap();
        tm.log(&a, add_entry(1, "a"), false).unwrap();
        tm.log(&b, add_entry(2, "b"), false).unwrap();
        tm.commit(&mut b).unwrap();
        tm.commit(&mut a).unwrap();
    }

    #[test]
    fn shared_index_pair_conflicts() {
        let tm = manager();
        let mut a = tm.begin(false).unwrap();
        let mut b = tm.begin(false).unwrap();
        let pair = || ChangeContainer::for_indices().with(IndexChange::add("member", "cn=g", 9));
        tm.log(&a, pair(), true).unwrap();
        tm.log(&b, pair(), true).unwrap();
        tm.commit(&mut a).unwrap();
        assert!(tm.commit(&mut b).unwrap_err().is_conflict());
    }

    #[test]
    fn writer_started_after_commit_does_not_conflict() {
        let tm = manager();
        write(&tm, add_entry(1, "a")).unwrap();
        let mut later = tm.begin(false).unwrap();
        let before = Entry::new("cn=a,dc=example").with("cn", ["a"]);
        tm.log(
            &later,
            ChangeContainer::for_entry(1).with(LogEdit::modify(&before, Modification::add("sn", ["s"]))),
            false,
        )
        .unwrap();
        tm.commit(&mut later).unwrap();
    }

    #[test]
    fn dropping_active_transaction_aborts_it() {
        let tm = manager();
        let seq = {
            let txn = tm.begin(false).unwrap();
            tm.log(&txn, add_entry(1, "x"), false).unwrap();
            txn.seq()
        };
        assert!(!tm.registered().contains(&seq));
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn foreign_transaction_is_rejected() {
        let tm = manager();
        let other = manager();
        let mut txn = other.begin(false).unwrap();
        let err = tm.commit(&mut txn).unwrap_err();
        assert!(matches!(err, CoreError::ForeignTransaction { .. }));
        assert!(err.is_usage_error());
    }

    #[test]
    fn committed_transactions_survive_reopen() {
        let volume = Arc::new(MemoryVolume::new());
        let (first, second) = {
            let tm: TxnManager<u64> =
                TxnManager::with_volume(PARTITION, Config::new(), volume.clone()).unwrap();
            let first = write(&tm, add_entry(1, "a")).unwrap();
            let second = write(&tm, add_entry(2, "b")).unwrap();
            let mut lost = tm.begin(false).unwrap();
            tm.log(&lost, add_entry(3, "c"), false).unwrap();
            tm.abort(&mut lost).unwrap();
            (first, second)
        };

        let tm: TxnManager<u64> = TxnManager::with_volume(PARTITION, Config::new(), volume).unwrap();
        assert_eq!(tm.registered().len(), 2);
        assert!(tm.next_seq() > second);
        assert!(second > first);

        let reader = tm.begin(true).unwrap();
        assert_eq!(reader.transactions_to_check().len(), 2);
    }

    #[test]
    fn log_directory_survives_reopen_and_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new().log_dir(dir.path());
        {
            let tm: TxnManager<u64> = TxnManager::open(PARTITION, config.clone()).unwrap();
            assert!(TxnManager::<u64>::open(PARTITION, config.clone()).is_err());

            let mut txn = tm.begin(false).unwrap();
            tm.log(&txn, add_entry(1, "a"), false).unwrap();
            let before = Entry::new(format!("cn=a,{PARTITION}")).with("cn", ["a"]);
            let second = ChangeContainer::for_entry(1)
                .with(LogEdit::modify(&before, Modification::add("sn", ["second"])));
            tm.log(&txn, second, false).unwrap();
            tm.commit(&mut txn).unwrap();
        }

        let tm: TxnManager<u64> = TxnManager::open(PARTITION, config).unwrap();
        assert_eq!(tm.registered().len(), 1);

        let store = MemoryPartition::new(PARTITION);
        assert_eq!(tm.flush(&store).unwrap(), 1);
        let entry = store.get(&1).unwrap().unwrap();
        assert!(entry.contains("sn", &Value::text("second")));
    }

    #[test]
    fn flush_applies_and_reclaims() {
        let tm = manager();
        let store = MemoryPartition::new(PARTITION);
        let mut txn = tm.begin(false).unwrap();
        tm.log(&txn, add_entry(1, "a"), false).unwrap();
        tm.commit(&mut txn).unwrap();

        assert_eq!(tm.flush(&store).unwrap(), 1);
        assert!(tm.registered().is_empty());
        assert_eq!(txn.state(), TxnState::Reclaimed);
        assert!(store.get(&1).unwrap().is_some());
        assert!(store.index_contains("cn", &Value::text("a"), &1));
        assert_eq!(tm.stats().snapshot().flushed, 1);
        assert_eq!(tm.flush(&store).unwrap(), 0);
    }

    #[test]
    fn flush_waits_for_older_readers() {
        let tm = manager();
        let store = MemoryPartition::new(PARTITION);
        let reader = tm.begin(true).unwrap();
        write(&tm, add_entry(1, "a")).unwrap();

        assert_eq!(tm.flush(&store).unwrap(), 0);
        assert_eq!(tm.registered().len(), 1);

        drop(reader);
        assert_eq!(tm.flush(&store).unwrap(), 1);
    }

    #[test]
    fn flush_stops_at_first_unfinished_transaction() {
        let tm = manager();
        let store = MemoryPartition::new(PARTITION);
        let pending = tm.begin(false).unwrap();
        write(&tm, add_entry(2, "b")).unwrap();
        assert_eq!(tm.flush(&store).unwrap(), 0);
        drop(pending);
        assert_eq!(tm.flush(&store).unwrap(), 1);
    }

    #[test]
    fn flushed_transactions_are_not_recovered() {
        let volume = Arc::new(MemoryVolume::new());
        let store = MemoryPartition::new(PARTITION);
        let last = {
            let tm: TxnManager<u64> =
                TxnManager::with_volume(PARTITION, Config::new(), volume.clone()).unwrap();
            write(&tm, add_entry(1, "a")).unwrap();
            tm.flush(&store).unwrap();
            write(&tm, add_entry(2, "b")).unwrap()
        };

        let tm: TxnManager<u64> = TxnManager::with_volume(PARTITION, Config::new(), volume).unwrap();
        assert_eq!(tm.registered().len(), 1);
        assert!(tm.next_seq() > last);
    }

    #[test]
    fn flush_purges_old_log_files() {
        let volume = Arc::new(MemoryVolume::new());
        let config = Config::new().max_log_file_size(64);
        let store = MemoryPartition::new(PARTITION);
        let tm: TxnManager<u64> =
            TxnManager::with_volume(PARTITION, config.clone(), volume.clone()).unwrap();
        for id in 1..=4 {
            write(&tm, add_entry(id, "x")).unwrap();
        }
        assert!(volume.segments().unwrap().len() > 1);

        tm.flush(&store).unwrap();
        assert_eq!(volume.segments().unwrap(), vec![tm.wal().current_segment()]);
        let next = tm.next_seq();
        drop(tm);

        let reopened: TxnManager<u64> = TxnManager::with_volume(PARTITION, config, volume).unwrap();
        assert!(reopened.registered().is_empty());
        assert_eq!(reopened.next_seq(), next);
    }

    #[test]
    fn unknown_partition_name() {
        let tm = manager();
        assert!(tm.ensure_partition(PARTITION).is_ok());
        assert!(matches!(
            tm.ensure_partition("dc=other"),
            Err(CoreError::UnknownPartition { .. })
        ));
    }

    /// Volume whose segments accept nothing.
    #[derive(Debug, Default)]
    struct BrokenVolume;

    #[derive(Debug)]
    struct BrokenBackend;

    impl StorageBackend for BrokenBackend {
        fn read_at(&self, _offset: u64, _len: usize) -> StorageResult<Vec<u8>> {
            Ok(Vec::new())
        }

        fn append(&mut self, _data: &[u8]) -> StorageResult<u64> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }

        fn flush(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn size(&self) -> StorageResult<u64> {
            Ok(0)
        }

        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn truncate(&mut self, _new_size: u64) -> StorageResult<()> {
            Ok(())
        }
    }

    impl LogVolume for BrokenVolume {
        fn segments(&self) -> StorageResult<Vec<u64>> {
            Ok(Vec::new())
        }

        fn open_segment(&self, _number: u64) -> StorageResult<Box<dyn StorageBackend>> {
            Ok(Box::new(BrokenBackend))
        }

        fn remove_segment(&self, _number: u64) -> StorageResult<()> {
            Ok(())
        }
    }

    #[test]
    fn log_failure_aborts_commit() {
        let tm: TxnManager<u64> =
            TxnManager::with_volume(PARTITION, Config::new(), Arc::new(BrokenVolume)).unwrap();
        let mut txn = tm.begin(false).unwrap();
        tm.log(&txn, add_entry(1, "x"), false).unwrap();

        let err = tm.commit(&mut txn).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(txn.state(), TxnState::Aborted);
        assert!(tm.registered().is_empty());

        let reader = tm.begin(true).unwrap();
        assert!(reader.transactions_to_check().is_empty());
    }
}
