//! In-memory partition store.

use crate::cursor::{BoxedCursor, EntryComparator, NaturalOrder, SortedCursor};
use crate::entry::{Entry, EntryId, EntryKey, Value};
use crate::error::CoreResult;
use crate::log::ChangeContainer;
use crate::store::index::AttributeIndex;
use crate::store::PartitionStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A partition held entirely in memory.
///
/// Entries live in an ordered table keyed by identifier; every indexed
/// attribute has an [`AttributeIndex`]. Scans hand out cursors over a copy
/// of the index taken when the scan starts.
#[derive(Debug)]
pub struct MemoryPartition<K: EntryKey = EntryId> {
    name: String,
    entries: RwLock<BTreeMap<K, Entry>>,
    indices: RwLock<BTreeMap<String, AttributeIndex<K>>>,
}

impl<K: EntryKey> MemoryPartition<K> {
    /// Creates an empty partition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(BTreeMap::new()),
            indices: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the partition name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `entry` without touching any index.
    pub fn insert(&self, id: K, entry: Entry) {
        self.entries.write().insert(id, entry);
    }

    /// Stores `entry` and indexes every one of its attribute values.
    pub fn insert_indexed(&self, id: K, entry: Entry) {
        {
            let mut indices = self.indices.write();
            for (attribute, values) in entry.attributes() {
                let index = indices.entry(attribute.to_string()).or_default();
                for value in values {
                    index.insert(value.clone(), id.clone());
                }
            }
        }
        self.insert(id, entry);
    }

    /// Adds one pair to the index of `attribute_oid`.
    pub fn index(&self, attribute_oid: &str, value: impl Into<Value>, id: K) {
        self.indices
            .write()
            .entry(attribute_oid.to_string())
            .or_default()
            .insert(value.into(), id);
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no entry is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of pairs in the index of `attribute_oid`.
    #[must_use]
    pub fn index_len(&self, attribute_oid: &str) -> usize {
        self.indices
            .read()
            .get(attribute_oid)
            .map_or(0, AttributeIndex::len)
    }

    /// Returns true if the index of `attribute_oid` holds the pair.
    #[must_use]
    pub fn index_contains(&self, attribute_oid: &str, value: &Value, id: &K) -> bool {
        self.indices
            .read()
            .get(attribute_oid)
            .is_some_and(|index| index.contains(value, id))
    }
}

impl<K: EntryKey> PartitionStore<K> for MemoryPartition<K> {
    fn get(&self, id: &K) -> CoreResult<Option<Entry>> {
        Ok(self.entries.read().get(id).cloned())
    }

    fn forward_scan(&self, attribute_oid: &str) -> CoreResult<BoxedCursor<Value, K>> {
        let entries = self
            .indices
            .read()
            .get(attribute_oid)
            .map(AttributeIndex::forward_entries)
            .unwrap_or_default();
        Ok(Box::new(SortedCursor::from_sorted(
            entries,
            EntryComparator::new(NaturalOrder),
            None,
        )))
    }

    fn reverse_scan(&self, attribute_oid: &str) -> CoreResult<BoxedCursor<K, Value>> {
        let entries = self
            .indices
            .read()
            .get(attribute_oid)
            .map(AttributeIndex::reverse_entries)
            .unwrap_or_default();
        Ok(Box::new(SortedCursor::from_sorted(
            entries,
            EntryComparator::new(NaturalOrder),
            None,
        )))
    }

    fn apply(&self, container: &ChangeContainer<K>) -> CoreResult<()> {
        if let Some(id) = container.target() {
            let mut entries = self.entries.write();
            let mut current = entries.get(id).cloned();
            if container.replay(&mut current) {
                match current {
                    Some(entry) => {
                        entries.insert(id.clone(), entry);
                    }
                    None => {
                        entries.remove(id);
                    }
                }
            }
        }

        let mut changes = container.index_changes().peekable();
        if changes.peek().is_some() {
            let mut indices = self.indices.write();
            for change in changes {
                indices
                    .entry(change.attribute_oid.clone())
                    .or_default()
                    .apply(change);
            }
        }
        Ok(())
    }
}
