//! Cursor over an in-memory sorted vector.

use crate::cursor::order::{EntryComparator, IndexEntry, KeyComparator};
use crate::cursor::traits::IndexCursor;
use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pos {
    /// In the gap just before element `i`.
    Gap(usize),
    /// On element `i`.
    On(usize),
}

/// Navigates a vector kept in comparator order.
///
/// With a locked-down key the cursor only ever reaches elements with that
/// key: positioning clamps into that range and stepping stops at its ends.
#[derive(Debug, Clone)]
pub struct SortedCursor<P, S, C> {
    entries: Vec<IndexEntry<P, S>>,
    comparator: EntryComparator<C>,
    lo: usize,
    hi: usize,
    pos: Pos,
    closed: bool,
}

impl<P, S, C> SortedCursor<P, S, C>
where
    P: Clone + Send,
    S: Clone + Ord + Send,
    C: KeyComparator<P>,
{
    /// Sorts `entries`, drops duplicates and positions before the first
    /// element.
    pub fn new(
        mut entries: Vec<IndexEntry<P, S>>,
        comparator: EntryComparator<C>,
        only_key: Option<&P>,
    ) -> Self {
        entries.sort_by(|a, b| comparator.compare(a, b));
        entries.dedup_by(|a, b| comparator.compare(a, b) == Ordering::Equal);
        Self::from_sorted(entries, comparator, only_key)
    }

    /// Wraps entries that are already sorted and unique.
    pub fn from_sorted(
        entries: Vec<IndexEntry<P, S>>,
        comparator: EntryComparator<C>,
        only_key: Option<&P>,
    ) -> Self {
        let (lo, hi) = match only_key {
            Some(key) => (
                entries.partition_point(|e| comparator.probe(e, key, None) == Ordering::Less),
                entries.partition_point(|e| comparator.probe(e, key, None) != Ordering::Greater),
            ),
            None => (0, entries.len()),
        };
        Self {
            entries,
            comparator,
            lo,
            hi,
            pos: Pos::Gap(lo),
            closed: false,
        }
    }

    /// Number of reachable elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hi - self.lo
    }

    /// Returns true if no element is reachable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hi == self.lo
    }

    /// Index of the current element in the backing vector.
    pub(crate) fn current_index(&self) -> Option<usize> {
        match self.pos {
            Pos::On(i) => Some(i),
            Pos::Gap(_) => None,
        }
    }

    /// Returns true if an element equal to `entry` is reachable.
    #[must_use]
    pub fn contains(&self, entry: &IndexEntry<P, S>) -> bool {
        self.entries[self.lo..self.hi]
            .binary_search_by(|e| self.comparator.compare(e, entry))
            .is_ok()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            Err(CoreError::CursorClosed)
        } else {
            Ok(())
        }
    }

    fn clamp(&self, i: usize) -> usize {
        i.clamp(self.lo, self.hi)
    }
}

impl<P, S, C> IndexCursor<P, S> for SortedCursor<P, S, C>
where
    P: Clone + Send,
    S: Clone + Ord + Send,
    C: KeyComparator<P>,
{
    fn before_first(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.pos = Pos::Gap(self.lo);
        Ok(())
    }

    fn after_last(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.pos = Pos::Gap(self.hi);
        Ok(())
    }

    fn before_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()> {
        self.ensure_open()?;
        let i = self
            .entries
            .partition_point(|e| self.comparator.probe(e, key, id) == Ordering::Less);
        self.pos = Pos::Gap(self.clamp(i));
        Ok(())
    }

    fn after_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()> {
        self.ensure_open()?;
        let i = self
            .entries
            .partition_point(|e| self.comparator.probe(e, key, id) != Ordering::Greater);
        self.pos = Pos::Gap(self.clamp(i));
        Ok(())
    }

    fn next(&mut self) -> CoreResult<bool> {
        self.ensure_open()?;
        let candidate = match self.pos {
            Pos::Gap(i) => i,
            Pos::On(i) => i + 1,
        };
        if candidate < self.hi {
            self.pos = Pos::On(candidate);
            Ok(true)
        } else {
            self.pos = Pos::Gap(self.hi);
            Ok(false)
        }
    }

    fn previous(&mut self) -> CoreResult<bool> {
        self.ensure_open()?;
        let boundary = match self.pos {
            Pos::Gap(i) | Pos::On(i) => i,
        };
        if boundary > self.lo {
            self.pos = Pos::On(boundary - 1);
            Ok(true)
        } else {
            self.pos = Pos::Gap(self.lo);
            Ok(false)
        }
    }

    fn get(&self) -> CoreResult<IndexEntry<P, S>> {
        self.ensure_open()?;
        match self.pos {
            Pos::On(i) => Ok(self.entries[i].clone()),
            Pos::Gap(_) => Err(CoreError::InvalidCursorPosition),
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::order::NaturalOrder;

    type Cursor = SortedCursor<i64, u64, NaturalOrder>;

    fn cursor(pairs: &[(i64, u64)], only: Option<i64>) -> Cursor {
        let entries = pairs.iter().map(|&(k, id)| IndexEntry::new(k, id)).collect();
        SortedCursor::new(entries, EntryComparator::new(NaturalOrder), only.as_ref())
    }

    fn drain_forward(c: &mut Cursor) -> Vec<(i64, u64)> {
        let mut out = Vec::new();
        while c.next().unwrap() {
            let e = c.get().unwrap();
            out.push((e.key, e.id));
        }
        out
    }

    fn drain_backward(c: &mut Cursor) -> Vec<(i64, u64)> {
        let mut out = Vec::new();
        while c.previous().unwrap() {
            let e = c.get().unwrap();
            out.push((e.key, e.id));
        }
        out
    }

    #[test]
    fn sorts_and_dedups() {
        let mut c = cursor(&[(6, 7), (4, 5), (6, 6), (4, 5)], None);
        assert_eq!(c.len(), 3);
        assert_eq!(drain_forward(&mut c), vec![(4, 5), (6, 6), (6, 7)]);
    }

    #[test]
    fn boundaries_return_false() {
        let mut c = cursor(&[(1, 1)], None);
        assert!(!c.previous().unwrap());
        assert!(c.next().unwrap());
        assert!(!c.next().unwrap());
        assert!(!c.next().unwrap());
        assert!(c.previous().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(1, 1));
    }

    #[test]
    fn get_off_element_fails() {
        let mut c = cursor(&[(1, 1)], None);
        assert!(matches!(c.get(), Err(CoreError::InvalidCursorPosition)));
        c.after_last().unwrap();
        assert!(matches!(c.get(), Err(CoreError::InvalidCursorPosition)));
    }

    #[test]
    fn value_positioning() {
        let pairs = [(4, 5), (6, 6), (6, 7), (8, 9)];
        let mut c = cursor(&pairs, None);

        c.before_value(None, &6).unwrap();
        assert!(c.next().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(6, 6));

        c.after_value(None, &6).unwrap();
        assert!(c.next().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(8, 9));

        c.after_value(Some(&6), &6).unwrap();
        assert!(c.next().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(6, 7));

        c.before_value(Some(&7), &6).unwrap();
        assert!(c.previous().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(6, 6));

        c.after_value(None, &5).unwrap();
        assert!(c.previous().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(4, 5));
    }

    #[test]
    fn after_last_then_backwards() {
        let mut c = cursor(&[(3, 1), (1, 1), (2, 1)], None);
        c.after_last().unwrap();
        assert_eq!(drain_backward(&mut c), vec![(3, 1), (2, 1), (1, 1)]);
    }

    #[test]
    fn locked_down_key() {
        let pairs = [(4, 5), (6, 6), (6, 7), (8, 9)];
        let mut c = cursor(&pairs, Some(6));
        assert_eq!(c.len(), 2);
        assert_eq!(drain_forward(&mut c), vec![(6, 6), (6, 7)]);
        c.after_last().unwrap();
        assert_eq!(drain_backward(&mut c), vec![(6, 7), (6, 6)]);

        c.before_value(None, &1).unwrap();
        assert!(c.next().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(6, 6));

        c.after_value(None, &100).unwrap();
        assert!(!c.next().unwrap());
        assert!(c.contains(&IndexEntry::new(6, 7)));
        assert!(!c.contains(&IndexEntry::new(8, 9)));
    }

    #[test]
    fn reversed_comparator() {
        let entries = vec![IndexEntry::new(1, 1), IndexEntry::new(2, 2), IndexEntry::new(3, 3)];
        let mut c: Cursor = SortedCursor::new(entries, EntryComparator::reversed(NaturalOrder), None);
        assert_eq!(drain_forward(&mut c), vec![(3, 3), (2, 2), (1, 1)]);
        c.after_value(None, &3).unwrap();
        assert!(c.next().unwrap());
        assert_eq!(c.get().unwrap(), IndexEntry::new(2, 2));
    }

    #[test]
    fn closed_cursor_rejects_use() {
        let mut c = cursor(&[(1, 1)], None);
        c.close();
        c.close();
        assert!(c.is_closed());
        assert!(matches!(c.next(), Err(CoreError::CursorClosed)));
        assert!(matches!(c.before_first(), Err(CoreError::CursorClosed)));
        assert!(matches!(c.get(), Err(CoreError::CursorClosed)));
    }
}
