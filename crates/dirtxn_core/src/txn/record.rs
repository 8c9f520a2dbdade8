//! Shared per-transaction record.

use crate::entry::EntryKey;
use crate::error::CoreResult;
use crate::log::{ChangeContainer, ChangeSet, WriteSet};
use crate::types::{TxnSeq, TxnState};
use parking_lot::RwLock;

/// Everything other transactions may need to know about one transaction.
///
/// Read-write records live in the registry and inside the to-check
/// snapshots of later transactions. The change set is only mutated by the
/// owning transaction while it is active; afterwards it is read-only.
#[derive(Debug)]
pub(crate) struct TxnRecord<K> {
    seq: TxnSeq,
    read_only: bool,
    inner: RwLock<RecordInner<K>>,
}

#[derive(Debug)]
struct RecordInner<K> {
    state: TxnState,
    commit_seq: Option<TxnSeq>,
    /// Set once the commit batch is in the log.
    durable: bool,
    changes: ChangeSet<K>,
    /// Frozen at commit for conflict checks by later committers.
    write_set: Option<WriteSet<K>>,
}

impl<K: EntryKey> TxnRecord<K> {
    pub(crate) fn new(seq: TxnSeq, read_only: bool) -> Self {
        Self {
            seq,
            read_only,
            inner: RwLock::new(RecordInner {
                state: TxnState::Active,
                commit_seq: None,
                durable: false,
                changes: ChangeSet::new(),
                write_set: None,
            }),
        }
    }

    /// Rebuilds a committed record from the log.
    pub(crate) fn recovered(
        seq: TxnSeq,
        commit: TxnSeq,
        containers: Vec<ChangeContainer<K>>,
    ) -> CoreResult<Self> {
        let mut changes = ChangeSet::new();
        for container in containers {
            let is_index_change = container.target().is_none();
            changes.stage(container, is_index_change)?;
        }
        let write_set = changes.write_set();
        Ok(Self {
            seq,
            read_only: false,
            inner: RwLock::new(RecordInner {
                state: TxnState::Committed,
                commit_seq: Some(commit),
                durable: true,
                changes,
                write_set: Some(write_set),
            }),
        })
    }

    pub(crate) fn seq(&self) -> TxnSeq {
        self.seq
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub(crate) fn state(&self) -> TxnState {
        self.inner.read().state
    }

    pub(crate) fn commit_seq(&self) -> Option<TxnSeq> {
        self.inner.read().commit_seq
    }

    /// True if this record's changes are part of the state seen by a
    /// transaction that began at `start`.
    pub(crate) fn visible_at(&self, start: TxnSeq) -> bool {
        let inner = self.inner.read();
        inner.state.is_committed() && inner.commit_seq.is_some_and(|c| c < start)
    }

    /// True if committed after `start` with a write set intersecting
    /// `writes`.
    pub(crate) fn conflicts_with(&self, start: TxnSeq, writes: &WriteSet<K>) -> bool {
        let inner = self.inner.read();
        inner.state == TxnState::Committed
            && inner.commit_seq.is_some_and(|c| c > start)
            && inner
                .write_set
                .as_ref()
                .is_some_and(|own| own.intersects(writes))
    }

    /// True once the record may be applied to the base store by a flush
    /// whose horizon is `horizon`.
    pub(crate) fn flushable_before(&self, horizon: TxnSeq) -> bool {
        let inner = self.inner.read();
        inner.state == TxnState::Committed
            && inner.durable
            && inner.commit_seq.is_some_and(|c| c < horizon)
    }

    pub(crate) fn stage(&self, container: ChangeContainer<K>, is_index_change: bool) -> CoreResult<()> {
        self.inner.write().changes.stage(container, is_index_change)
    }

    pub(crate) fn write_set(&self) -> WriteSet<K> {
        self.inner.read().changes.write_set()
    }

    /// Runs `f` over the change set.
    pub(crate) fn with_changes<R>(&self, f: impl FnOnce(&ChangeSet<K>) -> R) -> R {
        f(&self.inner.read().changes)
    }

    pub(crate) fn mark_committed(&self, commit: TxnSeq, write_set: WriteSet<K>) {
        let mut inner = self.inner.write();
        inner.state = TxnState::Committed;
        inner.commit_seq = Some(commit);
        inner.write_set = Some(write_set);
    }

    pub(crate) fn mark_durable(&self) {
        self.inner.write().durable = true;
    }

    /// Aborting drops the staged changes.
    pub(crate) fn mark_aborted(&self) {
        let mut inner = self.inner.write();
        inner.state = TxnState::Aborted;
        inner.changes = ChangeSet::new();
        inner.write_set = None;
    }

    pub(crate) fn mark_reclaimed(&self) {
        self.inner.write().state = TxnState::Reclaimed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::IndexChange;

    fn staged(seq: u64, id: u64) -> TxnRecord<u64> {
        let record = TxnRecord::new(TxnSeq::new(seq), false);
        record
            .stage(
                ChangeContainer::for_entry(id).with(IndexChange::add("cn", "x", id)),
                false,
            )
            .unwrap();
        record
    }

    #[test]
    fn visibility_follows_commit_order() {
        let record = staged(1, 10);
        assert!(!record.visible_at(TxnSeq::new(5)));
        record.mark_committed(TxnSeq::new(3), record.write_set());
        assert!(record.visible_at(TxnSeq::new(4)));
        assert!(!record.visible_at(TxnSeq::new(3)));
        record.mark_reclaimed();
        assert!(record.visible_at(TxnSeq::new(4)));
    }

    #[test]
    fn conflicts_only_after_start() {
        let record = staged(1, 10);
        let writes = staged(2, 10).write_set();
        record.mark_committed(TxnSeq::new(3), record.write_set());
        assert!(record.conflicts_with(TxnSeq::new(2), &writes));
        assert!(!record.conflicts_with(TxnSeq::new(4), &writes));
        assert!(!record.conflicts_with(TxnSeq::new(2), &staged(5, 11).write_set()));
    }

    #[test]
    fn flushable_requires_durable() {
        let record = staged(1, 10);
        record.mark_committed(TxnSeq::new(2), record.write_set());
        assert!(!record.flushable_before(TxnSeq::new(9)));
        record.mark_durable();
        assert!(record.flushable_before(TxnSeq::new(9)));
        assert!(!record.flushable_before(TxnSeq::new(2)));
    }

    #[test]
    fn abort_drops_changes() {
        let record = staged(1, 10);
        record.mark_aborted();
        assert_eq!(record.state(), TxnState::Aborted);
        assert!(record.with_changes(ChangeSet::is_empty));
        assert!(!record.visible_at(TxnSeq::new(100)));
    }

    #[test]
    fn recovered_record_is_committed_and_durable() {
        let containers = vec![
            ChangeContainer::for_entry(4u64).with(IndexChange::add("cn", "a", 4u64)),
            ChangeContainer::for_indices().with(IndexChange::add("cn", "b", 5u64)),
        ];
        let record = TxnRecord::recovered(TxnSeq::new(1), TxnSeq::new(2), containers).unwrap();
        assert_eq!(record.state(), TxnState::Committed);
        assert!(record.flushable_before(TxnSeq::new(3)));
        assert_eq!(record.with_changes(|c| c.index_changes().count()), 2);
    }
}
