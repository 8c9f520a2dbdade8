//! Folding pending changes over base-store reads.

use crate::cursor::{BoxedCursor, DeltaCursor, EntryComparator, IndexCursorWrapper, IndexEntry, KeyComparator};
use crate::entry::{Entry, EntryId, EntryKey, Value};
use crate::error::CoreResult;
use crate::log::{EditKind, IndexChange};
use crate::txn::manager::TxnManager;
use crate::txn::transaction::Transaction;
use std::sync::Arc;

/// Read path of the overlay.
///
/// Everything a transaction may see but the base store does not hold yet
/// comes from the registry: its own staged changes and the changes of
/// every to-check peer that committed before it began, taken in ascending
/// sequence order. Nothing here writes.
#[derive(Debug)]
pub struct TxnLogManager<K: EntryKey = EntryId> {
    manager: Arc<TxnManager<K>>,
}

impl<K: EntryKey> Clone for TxnLogManager<K> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<K: EntryKey> TxnLogManager<K> {
    /// Creates a log manager reading through `manager`'s registry.
    pub fn new(manager: Arc<TxnManager<K>>) -> Self {
        Self { manager }
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<TxnManager<K>> {
        &self.manager
    }

    /// Returns the entry `txn` should see for `id`, given what the base
    /// store holds (`base`).
    ///
    /// An entry add replaces the working copy with its snapshot, an entry
    /// delete clears it, and modifications apply their redo half to it.
    /// Without any applicable change `base` comes back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::UnknownPartition`],
    /// [`crate::CoreError::ForeignTransaction`] or
    /// [`crate::CoreError::TransactionNotActive`].
    pub fn merge_updates(
        &self,
        txn: &Transaction<K>,
        partition: &str,
        id: &K,
        base: Option<Entry>,
    ) -> CoreResult<Option<Entry>> {
        self.check(txn, partition)?;

        let mut current = base;
        for record in txn.visible_records() {
            record.with_changes(|changes| {
                if let Some(container) = changes.container_for(id) {
                    container.replay(&mut current);
                }
            });
        }
        Ok(current)
    }

    /// Overlays `txn`'s visible changes to the `(value, id)` index of
    /// `attribute_oid` on `base`.
    ///
    /// With `only_key` the cursor only reaches entries holding that value.
    ///
    /// # Errors
    ///
    /// Same as [`TxnLogManager::merge_updates`].
    pub fn wrap_forward<C>(
        &self,
        txn: &Transaction<K>,
        partition: &str,
        base: BoxedCursor<Value, K>,
        comparator: EntryComparator<C>,
        attribute_oid: &str,
        only_key: Option<Value>,
    ) -> CoreResult<IndexCursorWrapper<Value, K, C>>
    where
        C: KeyComparator<Value>,
    {
        self.check(txn, partition)?;
        let changes = visible_index_changes(txn, attribute_oid, |change| {
            IndexEntry::new(change.value.clone(), change.id.clone())
        });
        let delta = DeltaCursor::new(changes, comparator.clone(), only_key.as_ref());
        Ok(IndexCursorWrapper::new(base, delta, comparator))
    }

    /// Overlays `txn`'s visible changes to the `(id, value)` index of
    /// `attribute_oid` on `base`.
    ///
    /// With `only_key` the cursor only reaches the values of that entry.
    ///
    /// # Errors
    ///
    /// Same as [`TxnLogManager::merge_updates`].
    pub fn wrap_reverse<C>(
        &self,
        txn: &Transaction<K>,
        partition: &str,
        base: BoxedCursor<K, Value>,
        comparator: EntryComparator<C>,
        attribute_oid: &str,
        only_key: Option<K>,
    ) -> CoreResult<IndexCursorWrapper<K, Value, C>>
    where
        C: KeyComparator<K>,
    {
        self.check(txn, partition)?;
        let changes = visible_index_changes(txn, attribute_oid, |change| {
            IndexEntry::new(change.id.clone(), change.value.clone())
        });
        let delta = DeltaCursor::new(changes, comparator.clone(), only_key.as_ref());
        Ok(IndexCursorWrapper::new(base, delta, comparator))
    }

    fn check(&self, txn: &Transaction<K>, partition: &str) -> CoreResult<()> {
        self.manager.ensure_partition(partition)?;
        self.manager.ensure_owned(txn)?;
        txn.ensure_active()
    }
}

/// Index changes to `attribute_oid` visible to `txn`, oldest first.
fn visible_index_changes<K, T>(
    txn: &Transaction<K>,
    attribute_oid: &str,
    entry: impl Fn(&IndexChange<K>) -> T,
) -> Vec<(T, EditKind)>
where
    K: EntryKey,
{
    let mut out = Vec::new();
    for record in txn.visible_records() {
        record.with_changes(|changes| {
            out.extend(
                changes
                    .index_changes()
                    .filter(|change| change.attribute_oid == attribute_oid)
                    .map(|change| (entry(change), change.kind)),
            );
        });
    }
    out
}
