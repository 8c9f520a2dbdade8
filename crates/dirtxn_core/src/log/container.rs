//! Change containers.

use crate::entry::Entry;
use crate::log::edit::{EditKind, IndexChange, LogEdit};
use serde::{Deserialize, Serialize};

/// An ordered batch of edits belonging to one transaction.
///
/// Entry containers name their target entry; index containers have no
/// target and carry only [`LogEdit::Index`] edits. Order is significant:
/// edits replay front to back and revert back to front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeContainer<K> {
    target: Option<K>,
    edits: Vec<LogEdit<K>>,
}

impl<K> ChangeContainer<K> {
    /// Creates an empty container for entry `id`.
    pub fn for_entry(id: K) -> Self {
        Self {
            target: Some(id),
            edits: Vec::new(),
        }
    }

    /// Creates an empty index-change container.
    #[must_use]
    pub fn for_indices() -> Self {
        Self {
            target: None,
            edits: Vec::new(),
        }
    }

    /// Appends an edit and returns the container.
    #[must_use]
    pub fn with(mut self, edit: impl Into<LogEdit<K>>) -> Self {
        self.edits.push(edit.into());
        self
    }

    /// Appends an edit.
    pub fn push(&mut self, edit: impl Into<LogEdit<K>>) {
        self.edits.push(edit.into());
    }

    /// Appends every edit of `other` after this container's edits.
    pub fn extend(&mut self, other: Self) {
        self.edits.extend(other.edits);
    }

    /// Returns the target entry, `None` for index containers.
    #[must_use]
    pub fn target(&self) -> Option<&K> {
        self.target.as_ref()
    }

    /// Returns the edits in order.
    #[must_use]
    pub fn edits(&self) -> &[LogEdit<K>] {
        &self.edits
    }

    /// Number of edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Returns true if the container holds no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Returns true if every edit is an index change.
    #[must_use]
    pub fn is_index_only(&self) -> bool {
        self.edits.iter().all(|e| matches!(e, LogEdit::Index(_)))
    }

    /// Iterates the index changes in order.
    pub fn index_changes(&self) -> impl Iterator<Item = &IndexChange<K>> {
        self.edits.iter().filter_map(LogEdit::as_index)
    }

    /// Replays the entry edits onto `current`, oldest first.
    ///
    /// An entry add replaces the working copy with its snapshot, an entry
    /// delete clears it, and modifications apply their redo half to the
    /// working copy if there is one. Index edits are skipped. Returns true
    /// if any entry edit was seen.
    pub fn replay(&self, current: &mut Option<Entry>) -> bool {
        let mut touched = false;
        for edit in &self.edits {
            match edit {
                LogEdit::Entry {
                    kind: EditKind::Add,
                    entry,
                } => {
                    *current = Some(entry.clone());
                    touched = true;
                }
                LogEdit::Entry {
                    kind: EditKind::Delete,
                    ..
                } => {
                    *current = None;
                    touched = true;
                }
                LogEdit::Modify { redo, .. } => {
                    if let Some(entry) = current.as_mut() {
                        entry.apply(redo);
                    }
                    touched = true;
                }
                LogEdit::Index(_) => {}
            }
        }
        touched
    }

    /// Undoes the entry edits on `current`, newest first.
    #[must_use]
    pub fn revert(&self, mut current: Option<Entry>) -> Option<Entry> {
        for edit in self.edits.iter().rev() {
            match edit {
                LogEdit::Entry {
                    kind: EditKind::Add,
                    ..
                } => current = None,
                LogEdit::Entry {
                    kind: EditKind::Delete,
                    entry,
                } => current = Some(entry.clone()),
                LogEdit::Modify { undo, .. } => {
                    if let Some(entry) = current.as_mut() {
                        entry.apply(undo);
                    }
                }
                LogEdit::Index(_) => {}
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Modification, Value};

    fn base() -> Entry {
        Entry::new("cn=e,dc=example").with("sn", ["orig"])
    }

    #[test]
    fn replay_applies_modifications_in_order() {
        let before = base();
        let mut mid = before.clone();
        let first = Modification::add("sn", ["extra"]);
        let first_edit = LogEdit::modify(&mid, first.clone());
        mid.apply(&first);
        let second = LogEdit::modify(&mid, Modification::remove("sn", ["orig"]));

        let container = ChangeContainer::for_entry(1u64).with(first_edit).with(second);
        let mut current = Some(before);
        assert!(container.replay(&mut current));

        let entry = current.unwrap();
        assert!(entry.contains("sn", &Value::text("extra")));
        assert!(!entry.contains("sn", &Value::text("orig")));
    }

    #[test]
    fn replay_add_then_delete() {
        let container = ChangeContainer::for_entry(1u64)
            .with(LogEdit::add_entry(base()))
            .with(LogEdit::delete_entry(base()));
        let mut current = None;
        container.replay(&mut current);
        assert!(current.is_none());
    }

    #[test]
    fn replay_ignores_index_edits() {
        let container =
            ChangeContainer::for_indices().with(IndexChange::add("sn", "orig", 1u64));
        let mut current = Some(base());
        assert!(!container.replay(&mut current));
        assert_eq!(current, Some(base()));
    }

    #[test]
    fn revert_undoes_replay() {
        let before = base();
        let mut mid = before.clone();
        let m1 = Modification::replace("sn", ["x", "y"]);
        let e1 = LogEdit::modify(&mid, m1.clone());
        mid.apply(&m1);
        let m2 = Modification::rename("cn=e,ou=moved,dc=example");
        let e2 = LogEdit::modify(&mid, m2);

        let container = ChangeContainer::for_entry(1u64).with(e1).with(e2);
        let mut current = Some(before.clone());
        container.replay(&mut current);
        assert_ne!(current, Some(before.clone()));
        assert_eq!(container.revert(current), Some(before));
    }

    #[test]
    fn revert_entry_add_and_delete() {
        let added = ChangeContainer::for_entry(1u64).with(LogEdit::add_entry(base()));
        assert_eq!(added.revert(Some(base())), None);

        let deleted = ChangeContainer::for_entry(1u64).with(LogEdit::delete_entry(base()));
        assert_eq!(deleted.revert(None), Some(base()));
    }

    #[test]
    fn index_changes_in_edit_order() {
        let mut c = ChangeContainer::for_entry(1u64).with(IndexChange::add("cn", "a", 1u64));
        c.push(IndexChange::add("cn", "b", 1u64));
        let values: Vec<_> = c.index_changes().map(|c| c.value.clone()).collect();
        assert_eq!(values, vec![Value::text("a"), Value::text("b")]);
        assert!(c.is_index_only());

        c.push(LogEdit::add_entry(base()));
        assert!(!c.is_index_only());
        assert_eq!(c.index_changes().count(), 2);
    }

    #[test]
    fn extend_appends_edits_after_existing_ones() {
        let mut c = ChangeContainer::for_entry(1u64).with(LogEdit::add_entry(base()));
        c.extend(ChangeContainer::for_entry(1u64).with(LogEdit::delete_entry(base())));
        assert_eq!(c.len(), 2);
        assert_eq!(c.target(), Some(&1));

        let mut current = None;
        c.replay(&mut current);
        assert!(current.is_none());
    }
}
