//! Ordered per-attribute index.

use crate::cursor::IndexEntry;
use crate::entry::{EntryKey, Value};
use crate::log::{EditKind, IndexChange};
use std::collections::BTreeSet;

/// Forward and reverse views of one attribute's index.
///
/// The forward set is ordered by `(value, id)` and answers "which entries
/// hold this value"; the reverse set is ordered by `(id, value)` and
/// answers "which values does this entry hold". Both always contain the
/// same pairs.
#[derive(Debug, Clone)]
pub struct AttributeIndex<K> {
    forward: BTreeSet<(Value, K)>,
    reverse: BTreeSet<(K, Value)>,
}

impl<K> Default for AttributeIndex<K> {
    fn default() -> Self {
        Self {
            forward: BTreeSet::new(),
            reverse: BTreeSet::new(),
        }
    }
}

impl<K: EntryKey> AttributeIndex<K> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair. Returns false if it was already present.
    pub fn insert(&mut self, value: Value, id: K) -> bool {
        self.reverse.insert((id.clone(), value.clone()));
        self.forward.insert((value, id))
    }

    /// Removes a pair. Returns false if it was absent.
    pub fn remove(&mut self, value: &Value, id: &K) -> bool {
        self.reverse.remove(&(id.clone(), value.clone()));
        self.forward.remove(&(value.clone(), id.clone()))
    }

    /// Applies one logged change.
    pub fn apply(&mut self, change: &IndexChange<K>) {
        match change.kind {
            EditKind::Add => {
                self.insert(change.value.clone(), change.id.clone());
            }
            EditKind::Delete => {
                self.remove(&change.value, &change.id);
            }
        }
    }

    /// Returns true if the pair is present.
    #[must_use]
    pub fn contains(&self, value: &Value, id: &K) -> bool {
        self.forward.contains(&(value.clone(), id.clone()))
    }

    /// Entries holding `value`, ascending.
    pub fn lookup<'a>(&'a self, value: &'a Value) -> impl Iterator<Item = &'a K> {
        self.forward
            .iter()
            .skip_while(move |(v, _)| v < value)
            .take_while(move |(v, _)| v == value)
            .map(|(_, id)| id)
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Forward view as `(value, id)` entries in ascending order.
    #[must_use]
    pub fn forward_entries(&self) -> Vec<IndexEntry<Value, K>> {
        self.forward
            .iter()
            .map(|(v, id)| IndexEntry::new(v.clone(), id.clone()))
            .collect()
    }

    /// Reverse view as `(id, value)` entries in ascending order.
    #[must_use]
    pub fn reverse_entries(&self) -> Vec<IndexEntry<K, Value>> {
        self.reverse
            .iter()
            .map(|(id, v)| IndexEntry::new(id.clone(), v.clone()))
            .collect()
    }
}
