//! Cursor over pending index changes.

use crate::cursor::order::{EntryComparator, IndexEntry, KeyComparator};
use crate::cursor::sorted::SortedCursor;
use crate::cursor::traits::IndexCursor;
use crate::error::{CoreError, CoreResult};
use crate::log::EditKind;
use std::cmp::Ordering;

/// Iterates the index deltas visible to a transaction.
///
/// Built from index changes in the order they happened; for each
/// `(key, id)` pair only the last change survives. A surviving add is an
/// element the cursor iterates. A surviving delete is a tombstone: it
/// suppresses the matching base element through [`DeltaCursor::is_deleted`]
/// and is not iterated, unless the cursor was built in raw mode, where
/// every surviving delta is iterated and [`DeltaCursor::current_kind`]
/// tells adds from tombstones.
#[derive(Debug, Clone)]
pub struct DeltaCursor<P, S, C> {
    cursor: SortedCursor<P, S, C>,
    /// Kind of each element of `cursor`, by backing index.
    kinds: Vec<EditKind>,
    tombstones: Vec<IndexEntry<P, S>>,
    comparator: EntryComparator<C>,
    only_key: Option<P>,
}

impl<P, S, C> DeltaCursor<P, S, C>
where
    P: Clone + Send,
    S: Clone + Ord + Send,
    C: KeyComparator<P>,
{
    /// Folds `changes` and builds the cursor.
    pub fn new(
        changes: impl IntoIterator<Item = (IndexEntry<P, S>, EditKind)>,
        comparator: EntryComparator<C>,
        only_key: Option<&P>,
    ) -> Self {
        Self::build(changes, comparator, only_key, false)
    }

    /// Like [`DeltaCursor::new`] but iterates tombstones too.
    pub fn raw(
        changes: impl IntoIterator<Item = (IndexEntry<P, S>, EditKind)>,
        comparator: EntryComparator<C>,
        only_key: Option<&P>,
    ) -> Self {
        Self::build(changes, comparator, only_key, true)
    }

    fn build(
        changes: impl IntoIterator<Item = (IndexEntry<P, S>, EditKind)>,
        comparator: EntryComparator<C>,
        only_key: Option<&P>,
        raw: bool,
    ) -> Self {
        let mut folded: Vec<(IndexEntry<P, S>, EditKind)> = changes.into_iter().collect();
        // Stable, so equal pairs stay in arrival order and the last one wins.
        folded.sort_by(|a, b| comparator.compare(&a.0, &b.0));
        let mut last: Vec<(IndexEntry<P, S>, EditKind)> = Vec::with_capacity(folded.len());
        for change in folded {
            match last.last_mut() {
                Some(prev) if comparator.compare(&prev.0, &change.0) == Ordering::Equal => {
                    *prev = change;
                }
                _ => last.push(change),
            }
        }

        let tombstones = last
            .iter()
            .filter(|(_, kind)| *kind == EditKind::Delete)
            .map(|(entry, _)| entry.clone())
            .collect();
        let (entries, kinds): (Vec<_>, Vec<_>) = last
            .into_iter()
            .filter(|(_, kind)| raw || *kind == EditKind::Add)
            .unzip();

        Self {
            cursor: SortedCursor::from_sorted(entries, comparator.clone(), only_key),
            kinds,
            tombstones,
            comparator,
            only_key: only_key.cloned(),
        }
    }

    /// The key the cursor is locked down to, if any.
    #[must_use]
    pub fn only_key(&self) -> Option<&P> {
        self.only_key.as_ref()
    }

    /// Returns true if a tombstone hides `entry`.
    #[must_use]
    pub fn is_deleted(&self, entry: &IndexEntry<P, S>) -> bool {
        self.tombstones
            .binary_search_by(|t| self.comparator.compare(t, entry))
            .is_ok()
    }

    /// Kind of the delta the cursor is on.
    ///
    /// # Errors
    ///
    /// Fails if the cursor is closed or not on an element.
    pub fn current_kind(&self) -> CoreResult<EditKind> {
        if self.cursor.is_closed() {
            return Err(CoreError::CursorClosed);
        }
        self.cursor
            .current_index()
            .map(|i| self.kinds[i])
            .ok_or(CoreError::InvalidCursorPosition)
    }

    /// Number of iterable deltas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor.len()
    }

    /// Returns true if there is nothing to iterate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    /// Number of tombstones.
    #[must_use]
    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }
}

impl<P, S, C> IndexCursor<P, S> for DeltaCursor<P, S, C>
where
    P: Clone + Send,
    S: Clone + Ord + Send,
    C: KeyComparator<P>,
{
    fn before_first(&mut self) -> CoreResult<()> {
        self.cursor.before_first()
    }

    fn after_last(&mut self) -> CoreResult<()> {
        self.cursor.after_last()
    }

    fn before_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()> {
        self.cursor.before_value(id, key)
    }

    fn after_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()> {
        self.cursor.after_value(id, key)
    }

    fn next(&mut self) -> CoreResult<bool> {
        self.cursor.next()
    }

    fn previous(&mut self) -> CoreResult<bool> {
        self.cursor.previous()
    }

    fn get(&self) -> CoreResult<IndexEntry<P, S>> {
        self.cursor.get()
    }

    fn close(&mut self) {
        self.cursor.close();
    }

    fn is_closed(&self) -> bool {
        self.cursor.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::order::NaturalOrder;

    fn add(k: i64, id: u64) -> (IndexEntry<i64, u64>, EditKind) {
        (IndexEntry::new(k, id), EditKind::Add)
    }

    fn del(k: i64, id: u64) -> (IndexEntry<i64, u64>, EditKind) {
        (IndexEntry::new(k, id), EditKind::Delete)
    }

    fn collect(c: &mut DeltaCursor<i64, u64, NaturalOrder>) -> Vec<(i64, u64)> {
        c.before_first().unwrap();
        let mut out = Vec::new();
        while c.next().unwrap() {
            let e = c.get().unwrap();
            out.push((e.key, e.id));
        }
        out
    }

    #[test]
    fn iterates_adds_and_hides_tombstones() {
        let mut c = DeltaCursor::new(
            vec![add(10, 11), add(5, 5), del(6, 6)],
            EntryComparator::new(NaturalOrder),
            None,
        );
        assert_eq!(collect(&mut c), vec![(5, 5), (10, 11)]);
        assert!(c.is_deleted(&IndexEntry::new(6, 6)));
        assert!(!c.is_deleted(&IndexEntry::new(6, 7)));
        assert_eq!(c.tombstone_count(), 1);
    }

    #[test]
    fn last_change_per_pair_wins() {
        let mut c = DeltaCursor::new(
            vec![add(1, 1), del(1, 1), del(2, 2), add(2, 2)],
            EntryComparator::new(NaturalOrder),
            None,
        );
        assert_eq!(collect(&mut c), vec![(2, 2)]);
        assert!(c.is_deleted(&IndexEntry::new(1, 1)));
        assert!(!c.is_deleted(&IndexEntry::new(2, 2)));
    }

    #[test]
    fn raw_mode_reports_kinds() {
        let mut c = DeltaCursor::raw(
            vec![add(1, 1), del(2, 2)],
            EntryComparator::new(NaturalOrder),
            None,
        );
        assert_eq!(c.len(), 2);
        assert!(c.next().unwrap());
        assert_eq!(c.current_kind().unwrap(), EditKind::Add);
        assert!(c.next().unwrap());
        assert_eq!(c.current_kind().unwrap(), EditKind::Delete);
        assert!(!c.next().unwrap());
        assert!(matches!(c.current_kind(), Err(CoreError::InvalidCursorPosition)));
    }

    #[test]
    fn locked_down_deltas() {
        let mut c = DeltaCursor::new(
            vec![add(1, 1), add(2, 2), add(2, 3), add(3, 1)],
            EntryComparator::new(NaturalOrder),
            Some(&2),
        );
        assert_eq!(collect(&mut c), vec![(2, 2), (2, 3)]);
    }

    #[test]
    fn close_is_idempotent() {
        let mut c: DeltaCursor<i64, u64, NaturalOrder> =
            DeltaCursor::new(Vec::new(), EntryComparator::new(NaturalOrder), None);
        assert!(c.is_empty());
        c.close();
        c.close();
        assert!(matches!(c.next(), Err(CoreError::CursorClosed)));
    }
}
