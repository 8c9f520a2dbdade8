//! Log edits.

use crate::entry::{Entry, Modification, Value};
use serde::{Deserialize, Serialize};

/// Whether an edit materialises or removes something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    /// The entry or index pair comes into existence.
    Add,
    /// The entry or index pair stops existing.
    Delete,
}

/// One add or delete of a `(value, id)` pair in the index of an attribute.
///
/// The same pair serves both views of the index: the forward index is
/// ordered by `(value, id)`, the reverse index by `(id, value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexChange<K> {
    /// Attribute whose index changes.
    pub attribute_oid: String,
    /// Attribute value.
    pub value: Value,
    /// Entry the value belongs to.
    pub id: K,
    /// Add or delete.
    pub kind: EditKind,
}

impl<K> IndexChange<K> {
    /// Creates an index add.
    pub fn add(attribute_oid: impl Into<String>, value: impl Into<Value>, id: K) -> Self {
        Self {
            attribute_oid: attribute_oid.into(),
            value: value.into(),
            id,
            kind: EditKind::Add,
        }
    }

    /// Creates an index delete.
    pub fn delete(attribute_oid: impl Into<String>, value: impl Into<Value>, id: K) -> Self {
        Self {
            attribute_oid: attribute_oid.into(),
            value: value.into(),
            id,
            kind: EditKind::Delete,
        }
    }
}

/// A single recorded change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEdit<K> {
    /// Attribute or DN modification with its inverse.
    ///
    /// Only `redo` is used when merging; `undo` is for rolling back.
    Modify {
        /// Forward change.
        redo: Modification,
        /// Inverse of `redo` against the pre-image.
        undo: Modification,
    },
    /// Whole-entry add or delete, carrying the entry snapshot.
    Entry {
        /// `Add`: the entry did not exist before. `Delete`: it is removed.
        kind: EditKind,
        /// The added entry, or the entry as it was when deleted.
        entry: Entry,
    },
    /// Index pair add or delete.
    Index(IndexChange<K>),
}

impl<K> LogEdit<K> {
    /// Builds a `Modify` edit whose undo is computed against `before`.
    #[must_use]
    pub fn modify(before: &Entry, redo: Modification) -> Self {
        let undo = redo.undo_for(before);
        Self::Modify { redo, undo }
    }

    /// Builds an entry add.
    #[must_use]
    pub fn add_entry(entry: Entry) -> Self {
        Self::Entry {
            kind: EditKind::Add,
            entry,
        }
    }

    /// Builds an entry delete.
    #[must_use]
    pub fn delete_entry(entry: Entry) -> Self {
        Self::Entry {
            kind: EditKind::Delete,
            entry,
        }
    }

    /// Returns the index change, if this is one.
    #[must_use]
    pub fn as_index(&self) -> Option<&IndexChange<K>> {
        match self {
            Self::Index(change) => Some(change),
            _ => None,
        }
    }
}

impl<K> From<IndexChange<K>> for LogEdit<K> {
    fn from(change: IndexChange<K>) -> Self {
        Self::Index(change)
    }
}
