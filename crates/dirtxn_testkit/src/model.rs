//! Reference models.
//!
//! Straightforward set and map implementations of what the engine computes
//! incrementally. Property tests run the same input through both and
//! compare.

use crate::generators::EntryOperation;
use dirtxn_core::{
    ChangeContainer, EditKind, Entry, IndexChange, LogEdit, Value,
};
use std::collections::{BTreeMap, BTreeSet};

/// One attribute index as a plain ordered set of `(value, id)` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    pairs: BTreeSet<(Value, u64)>,
}

impl ReferenceIndex {
    /// Creates an index holding `pairs`.
    pub fn new(pairs: impl IntoIterator<Item = (Value, u64)>) -> Self {
        Self {
            pairs: pairs.into_iter().collect(),
        }
    }

    /// Applies one change; a later change to the same pair overrides an
    /// earlier one.
    pub fn apply(&mut self, change: &IndexChange<u64>) {
        let pair = (change.value.clone(), change.id);
        match change.kind {
            EditKind::Add => {
                self.pairs.insert(pair);
            }
            EditKind::Delete => {
                self.pairs.remove(&pair);
            }
        }
    }

    /// Pairs in forward order.
    #[must_use]
    pub fn forward(&self) -> Vec<(Value, u64)> {
        self.pairs.iter().cloned().collect()
    }

    /// Pairs in reverse-index order, `(id, value)`.
    #[must_use]
    pub fn reverse(&self) -> Vec<(u64, Value)> {
        let mut out: Vec<_> = self.pairs.iter().map(|(v, id)| (*id, v.clone())).collect();
        out.sort();
        out
    }

    /// Forward pairs strictly after every pair with key `key`.
    #[must_use]
    pub fn after_key(&self, key: &Value) -> Vec<(Value, u64)> {
        self.pairs.iter().filter(|(v, _)| v > key).cloned().collect()
    }

    /// Forward pairs at or after `(key, id)`.
    #[must_use]
    pub fn from_pair(&self, key: &Value, id: u64) -> Vec<(Value, u64)> {
        let probe = (key.clone(), id);
        self.pairs.range(probe..).cloned().collect()
    }

    /// Forward pairs whose key is `key`.
    #[must_use]
    pub fn with_key(&self, key: &Value) -> Vec<(Value, u64)> {
        self.pairs.iter().filter(|(v, _)| v == key).cloned().collect()
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// `base ∪ adds ∖ deletes`, with the last change to a pair winning.
#[must_use]
pub fn reference_merge(base: &[(Value, u64)], changes: &[IndexChange<u64>]) -> Vec<(Value, u64)> {
    let mut index = ReferenceIndex::new(base.iter().cloned());
    for change in changes {
        index.apply(change);
    }
    index.forward()
}

/// Entries by id, changed by whole [`EntryOperation`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceDirectory {
    entries: BTreeMap<u64, Entry>,
}

impl ReferenceDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns entry `id`.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&Entry> {
        self.entries.get(&id)
    }

    /// Ids of every entry.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    /// Turns `op` into the container that performs it against the current
    /// state and applies it to the model. Operations that do not apply (an
    /// add of an existing entry, a change to a missing one) return `None`
    /// and leave the model alone.
    pub fn plan(&mut self, op: &EntryOperation) -> Option<ChangeContainer<u64>> {
        match op {
            EntryOperation::Add { id, entry } => {
                if self.entries.contains_key(id) {
                    return None;
                }
                self.entries.insert(*id, entry.clone());
                Some(ChangeContainer::for_entry(*id).with(LogEdit::add_entry(entry.clone())))
            }
            EntryOperation::Modify { id, modification } => {
                let current = self.entries.get_mut(id)?;
                let edit = LogEdit::modify(current, modification.clone());
                current.apply(modification);
                Some(ChangeContainer::for_entry(*id).with(edit))
            }
            EntryOperation::Delete { id } => {
                let entry = self.entries.remove(id)?;
                Some(ChangeContainer::for_entry(*id).with(LogEdit::delete_entry(entry)))
            }
        }
    }
}
