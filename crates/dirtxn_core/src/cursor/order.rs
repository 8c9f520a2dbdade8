//! Index entries and their orderings.

use std::cmp::Ordering;

/// One `(key, id)` element of an index.
///
/// In a forward index the key is the attribute value and the id the entry
/// identifier; a reverse index swaps the two.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry<P, S> {
    /// Primary component.
    pub key: P,
    /// Secondary component.
    pub id: S,
}

impl<P, S> IndexEntry<P, S> {
    /// Creates an entry.
    pub fn new(key: P, id: S) -> Self {
        Self { key, id }
    }
}

/// Total order over index keys.
pub trait KeyComparator<P>: Clone + Send + Sync {
    /// Compares two keys.
    fn compare(&self, a: &P, b: &P) -> Ordering;
}

/// Orders keys by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl<P: Ord> KeyComparator<P> for NaturalOrder {
    fn compare(&self, a: &P, b: &P) -> Ordering {
        a.cmp(b)
    }
}

/// Inverts another key comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reversed<C>(pub C);

impl<P, C: KeyComparator<P>> KeyComparator<P> for Reversed<C> {
    fn compare(&self, a: &P, b: &P) -> Ordering {
        self.0.compare(a, b).reverse()
    }
}

/// Orders index entries: key first via `C`, then id ascending.
///
/// A reversed comparator inverts the whole `(key, id)` order.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryComparator<C> {
    keys: C,
    reversed: bool,
}

impl<C> EntryComparator<C> {
    /// Creates an ascending comparator.
    pub fn new(keys: C) -> Self {
        Self {
            keys,
            reversed: false,
        }
    }

    /// Creates a comparator for the inverted order.
    pub fn reversed(keys: C) -> Self {
        Self {
            keys,
            reversed: true,
        }
    }

    /// Returns true if the order is inverted.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Compares two entries.
    pub fn compare<P, S: Ord>(&self, a: &IndexEntry<P, S>, b: &IndexEntry<P, S>) -> Ordering
    where
        C: KeyComparator<P>,
    {
        self.probe(a, &b.key, Some(&b.id))
    }

    /// Compares `entry` with the position `(key, id)`.
    ///
    /// Without an id only the keys are compared, so every entry with an equal
    /// key compares `Equal`.
    pub fn probe<P, S: Ord>(&self, entry: &IndexEntry<P, S>, key: &P, id: Option<&S>) -> Ordering
    where
        C: KeyComparator<P>,
    {
        let ord = self
            .keys
            .compare(&entry.key, key)
            .then_with(|| id.map_or(Ordering::Equal, |id| entry.id.cmp(id)));
        if self.reversed {
            ord.reverse()
        } else {
            ord
        }
    }

    /// Compares two keys in this comparator's direction.
    pub fn compare_keys<P>(&self, a: &P, b: &P) -> Ordering
    where
        C: KeyComparator<P>,
    {
        let ord = self.keys.compare(a, b);
        if self.reversed {
            ord.reverse()
        } else {
            ord
        }
    }
}
