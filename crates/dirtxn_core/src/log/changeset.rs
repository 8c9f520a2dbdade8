//! Per-transaction change sets and write sets.

use crate::entry::{EntryKey, Value};
use crate::error::{CoreError, CoreResult};
use crate::log::container::ChangeContainer;
use crate::log::edit::IndexChange;
use std::collections::{BTreeMap, BTreeSet};

/// Every change staged by one read-write transaction.
///
/// Containers are kept in the order they were first staged. There is at
/// most one container per entry: staging another container for an entry
/// that already has one appends its edits to the existing container.
#[derive(Debug, Clone)]
pub struct ChangeSet<K> {
    staged: Vec<ChangeContainer<K>>,
    by_entry: BTreeMap<K, usize>,
}

impl<K> Default for ChangeSet<K> {
    fn default() -> Self {
        Self {
            staged: Vec::new(),
            by_entry: BTreeMap::new(),
        }
    }
}

impl<K: EntryKey> ChangeSet<K> {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a container.
    ///
    /// `is_index_change` containers must have no target and hold only index
    /// edits; every other container must name its target entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidContainer`] if the container does not
    /// match `is_index_change`.
    pub fn stage(&mut self, container: ChangeContainer<K>, is_index_change: bool) -> CoreResult<()> {
        match (is_index_change, container.target().cloned()) {
            (true, Some(_)) => Err(CoreError::invalid_container(
                "index change container must not name a target entry",
            )),
            (true, None) if !container.is_index_only() => Err(CoreError::invalid_container(
                "index change container holds entry edits",
            )),
            (true, None) => {
                self.staged.push(container);
                Ok(())
            }
            (false, None) => Err(CoreError::invalid_container(
                "entry change container has no target",
            )),
            (false, Some(target)) => {
                match self.by_entry.get(&target) {
                    Some(&i) => self.staged[i].extend(container),
                    None => {
                        self.by_entry.insert(target, self.staged.len());
                        self.staged.push(container);
                    }
                }
                Ok(())
            }
        }
    }

    /// The container targeting entry `id`, if one was staged.
    #[must_use]
    pub fn container_for(&self, id: &K) -> Option<&ChangeContainer<K>> {
        self.by_entry.get(id).map(|&i| &self.staged[i])
    }

    /// Every container in staging order.
    pub fn containers(&self) -> impl Iterator<Item = &ChangeContainer<K>> {
        self.staged.iter()
    }

    /// Every index change in staging order, wherever it was staged.
    pub fn index_changes(&self) -> impl Iterator<Item = &IndexChange<K>> {
        self.staged.iter().flat_map(ChangeContainer::index_changes)
    }

    /// Returns true if nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Number of distinct entries targeted.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.by_entry.len()
    }

    /// Computes the write set used for conflict detection.
    #[must_use]
    pub fn write_set(&self) -> WriteSet<K> {
        let mut set = WriteSet::default();
        set.entries.extend(self.by_entry.keys().cloned());
        for change in self.index_changes() {
            set.index_pairs.insert((
                change.attribute_oid.clone(),
                change.value.clone(),
                change.id.clone(),
            ));
        }
        set
    }
}

/// What a transaction wrote, at conflict-detection granularity.
///
/// Two write sets intersect when they share an entry identifier or an
/// `(attribute, value, id)` index pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSet<K> {
    entries: BTreeSet<K>,
    index_pairs: BTreeSet<(String, Value, K)>,
}

impl<K: Ord> Default for WriteSet<K> {
    fn default() -> Self {
        Self {
            entries: BTreeSet::new(),
            index_pairs: BTreeSet::new(),
        }
    }
}

impl<K: Ord> WriteSet<K> {
    /// Returns true if the write sets share an entry or index pair.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.entries.is_disjoint(&other.entries)
            || !self.index_pairs.is_disjoint(&other.index_pairs)
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.index_pairs.is_empty()
    }

    /// Returns true if entry `id` was written.
    #[must_use]
    pub fn contains_entry(&self, id: &K) -> bool {
        self.entries.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, Modification};
    use crate::log::edit::LogEdit;

    fn modify(id: u64, value: &str) -> ChangeContainer<u64> {
        let before = Entry::new(format!("cn={id}"));
        ChangeContainer::for_entry(id)
            .with(LogEdit::modify(&before, Modification::add("sn", [value])))
    }

    #[test]
    fn second_stage_appends_to_same_entry() {
        let mut set = ChangeSet::new();
        set.stage(modify(1, "a"), false).unwrap();
        set.stage(modify(2, "x"), false).unwrap();
        set.stage(modify(1, "b"), false).unwrap();
        assert_eq!(set.entry_count(), 2);
        assert_eq!(set.containers().count(), 2);
        assert!(set.container_for(&3).is_none());

        let container = set.container_for(&1).unwrap();
        assert_eq!(container.len(), 2);
        assert_eq!(container.target(), Some(&1));

        let mut entry = Some(Entry::new("cn=1"));
        container.replay(&mut entry);
        let sn = entry.unwrap();
        assert!(sn.contains("sn", &Value::text("a")));
        assert!(sn.contains("sn", &Value::text("b")));
        assert!(!sn.contains("sn", &Value::text("x")));
    }

    #[test]
    fn appended_edits_keep_staging_order() {
        let mut set = ChangeSet::new();
        set.stage(
            ChangeContainer::for_entry(1u64).with(LogEdit::add_entry(Entry::new("cn=1"))),
            false,
        )
        .unwrap();
        set.stage(
            ChangeContainer::for_entry(1u64).with(LogEdit::delete_entry(Entry::new("cn=1"))),
            false,
        )
        .unwrap();

        let container = set.container_for(&1).unwrap();
        assert_eq!(set.containers().count(), 1);
        let mut entry = None;
        assert!(container.replay(&mut entry));
        assert!(entry.is_none());
    }

    #[test]
    fn index_container_rules() {
        let mut set: ChangeSet<u64> = ChangeSet::new();
        let targeted = ChangeContainer::for_entry(1).with(IndexChange::add("cn", "a", 1));
        assert!(set.stage(targeted, true).is_err());

        let mixed = ChangeContainer::for_indices().with(LogEdit::add_entry(Entry::new("cn=x")));
        assert!(set.stage(mixed, true).is_err());

        let untargeted_entry = ChangeContainer::for_indices();
        assert!(set.stage(untargeted_entry, false).is_err());

        let ok = ChangeContainer::for_indices().with(IndexChange::add("cn", "a", 1));
        set.stage(ok, true).unwrap();
        assert_eq!(set.index_changes().count(), 1);
        assert!(!set.is_empty());
    }

    #[test]
    fn index_changes_keep_staging_order() {
        let mut set = ChangeSet::new();
        set.stage(
            ChangeContainer::for_entry(3u64).with(IndexChange::add("cn", "c", 3u64)),
            false,
        )
        .unwrap();
        set.stage(
            ChangeContainer::for_indices().with(IndexChange::delete("cn", "c", 3u64)),
            true,
        )
        .unwrap();
        let kinds: Vec<_> = set.index_changes().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![crate::log::EditKind::Add, crate::log::EditKind::Delete]
        );
        assert_eq!(set.containers().count(), 2);
    }

    #[test]
    fn empty_set() {
        let set: ChangeSet<u64> = ChangeSet::new();
        assert!(set.is_empty());
        assert!(set.write_set().is_empty());
    }

    #[test]
    fn write_sets_intersect_on_entry() {
        let mut a = ChangeSet::new();
        a.stage(modify(1, "a"), false).unwrap();
        let mut b = ChangeSet::new();
        b.stage(modify(1, "b"), false).unwrap();
        let mut c = ChangeSet::new();
        c.stage(modify(2, "b"), false).unwrap();

        assert!(a.write_set().intersects(&b.write_set()));
        assert!(!a.write_set().intersects(&c.write_set()));
        assert!(a.write_set().contains_entry(&1));
    }

    #[test]
    fn write_sets_intersect_on_index_pair_only_with_same_id() {
        let index = |value: &str, id: u64| {
            let mut set = ChangeSet::new();
            set.stage(
                ChangeContainer::for_indices().with(IndexChange::add("objectclass", value, id)),
                true,
            )
            .unwrap();
            set.write_set()
        };
        assert!(index("person", 1).intersects(&index("person", 1)));
        assert!(!index("person", 1).intersects(&index("person", 2)));
    }
}
