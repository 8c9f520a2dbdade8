//! Merging a base-store cursor with pending deltas.

use crate::cursor::delta::DeltaCursor;
use crate::cursor::order::{EntryComparator, IndexEntry, KeyComparator};
use crate::cursor::traits::{BoxedCursor, IndexCursor};
use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;

/// Where the merged stream stands. Both underlying cursors are
/// repositioned from this before every step.
#[derive(Debug, Clone)]
enum Anchor<P, S> {
    BeforeFirst,
    AfterLast,
    Before { key: P, id: Option<S> },
    After { key: P, id: Option<S> },
    On(IndexEntry<P, S>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// A cursor over `base ∪ adds ∖ tombstones`.
///
/// Yields base elements and add deltas interleaved in comparator order.
/// An add equal to a base element is yielded once; a base element matching
/// a tombstone is skipped. With a locked-down key only elements with that
/// key are reachable, whatever the base cursor itself would return.
pub struct IndexCursorWrapper<P, S, C> {
    base: BoxedCursor<P, S>,
    delta: DeltaCursor<P, S, C>,
    comparator: EntryComparator<C>,
    only_key: Option<P>,
    anchor: Anchor<P, S>,
    closed: bool,
}

impl<P, S, C> IndexCursorWrapper<P, S, C>
where
    P: Clone + Send,
    S: Clone + Ord + Send,
    C: KeyComparator<P>,
{
    /// Wraps `base` with `delta`. Positions before the first element.
    ///
    /// The wrapper is locked down to the same key as `delta`.
    pub fn new(
        base: BoxedCursor<P, S>,
        delta: DeltaCursor<P, S, C>,
        comparator: EntryComparator<C>,
    ) -> Self {
        let only_key = delta.only_key().cloned();
        Self {
            base,
            delta,
            comparator,
            only_key,
            anchor: Anchor::BeforeFirst,
            closed: false,
        }
    }

    /// The delta side of the merge.
    #[must_use]
    pub fn delta(&self) -> &DeltaCursor<P, S, C> {
        &self.delta
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed {
            Err(CoreError::CursorClosed)
        } else {
            Ok(())
        }
    }

    /// Where `key` falls relative to the locked-down key.
    fn lock_order(&self, key: &P) -> Ordering {
        self.only_key
            .as_ref()
            .map_or(Ordering::Equal, |only| self.comparator.compare_keys(key, only))
    }

    /// Positions both cursors so that stepping in `dir` continues from the
    /// anchor. Returns false if nothing can lie in that direction.
    fn reposition(&mut self, dir: Direction) -> CoreResult<bool> {
        let anchor = self.anchor.clone();
        match (anchor, dir) {
            (Anchor::AfterLast, Direction::Forward) | (Anchor::BeforeFirst, Direction::Backward) => {
                return Ok(false);
            }
            (Anchor::BeforeFirst, Direction::Forward) => {
                match self.only_key.clone() {
                    Some(only) => self.base.before_value(None, &only)?,
                    None => self.base.before_first()?,
                }
                self.delta.before_first()?;
            }
            (Anchor::AfterLast, Direction::Backward) => {
                match self.only_key.clone() {
                    Some(only) => self.base.after_value(None, &only)?,
                    None => self.base.after_last()?,
                }
                self.delta.after_last()?;
            }
            (Anchor::Before { key, id }, _) => {
                self.base.before_value(id.as_ref(), &key)?;
                self.delta.before_value(id.as_ref(), &key)?;
            }
            (Anchor::After { key, id }, _) => {
                self.base.after_value(id.as_ref(), &key)?;
                self.delta.after_value(id.as_ref(), &key)?;
            }
            (Anchor::On(entry), Direction::Forward) => {
                self.base.after_value(Some(&entry.id), &entry.key)?;
                self.delta.after_value(Some(&entry.id), &entry.key)?;
            }
            (Anchor::On(entry), Direction::Backward) => {
                self.base.before_value(Some(&entry.id), &entry.key)?;
                self.delta.before_value(Some(&entry.id), &entry.key)?;
            }
        }
        Ok(true)
    }

    /// Next visible base element in `dir`, skipping tombstoned ones and
    /// anything outside the locked-down key.
    fn step_base(&mut self, dir: Direction) -> CoreResult<Option<IndexEntry<P, S>>> {
        let (behind, beyond) = match dir {
            Direction::Forward => (Ordering::Less, Ordering::Greater),
            Direction::Backward => (Ordering::Greater, Ordering::Less),
        };
        loop {
            let moved = match dir {
                Direction::Forward => self.base.next()?,
                Direction::Backward => self.base.previous()?,
            };
            if !moved {
                return Ok(None);
            }
            let entry = self.base.get()?;
            let lock = self.lock_order(&entry.key);
            if lock == behind {
                continue;
            }
            if lock == beyond {
                return Ok(None);
            }
            if !self.delta.is_deleted(&entry) {
                return Ok(Some(entry));
            }
        }
    }

    fn step_delta(&mut self, dir: Direction) -> CoreResult<Option<IndexEntry<P, S>>> {
        let moved = match dir {
            Direction::Forward => self.delta.next()?,
            Direction::Backward => self.delta.previous()?,
        };
        if moved {
            Ok(Some(self.delta.get()?))
        } else {
            Ok(None)
        }
    }

    fn step(&mut self, dir: Direction) -> CoreResult<bool> {
        self.ensure_open()?;
        if !self.reposition(dir)? {
            return Ok(false);
        }
        let from_base = self.step_base(dir)?;
        let from_delta = self.step_delta(dir)?;

        let chosen = match (from_base, from_delta) {
            (None, None) => None,
            (Some(e), None) | (None, Some(e)) => Some(e),
            (Some(b), Some(d)) => {
                let ord = self.comparator.compare(&b, &d);
                let base_first = match dir {
                    Direction::Forward => ord != Ordering::Greater,
                    Direction::Backward => ord != Ordering::Less,
                };
                Some(if base_first { b } else { d })
            }
        };

        match chosen {
            Some(entry) => {
                self.anchor = Anchor::On(entry);
                Ok(true)
            }
            None => {
                self.anchor = match dir {
                    Direction::Forward => Anchor::AfterLast,
                    Direction::Backward => Anchor::BeforeFirst,
                };
                Ok(false)
            }
        }
    }
}

impl<P, S, C> IndexCursor<P, S> for IndexCursorWrapper<P, S, C>
where
    P: Clone + Send,
    S: Clone + Ord + Send,
    C: KeyComparator<P>,
{
    fn before_first(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.anchor = Anchor::BeforeFirst;
        Ok(())
    }

    fn after_last(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.anchor = Anchor::AfterLast;
        Ok(())
    }

    fn before_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()> {
        self.ensure_open()?;
        self.anchor = Anchor::Before {
            key: key.clone(),
            id: id.cloned(),
        };
        Ok(())
    }

    fn after_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()> {
        self.ensure_open()?;
        self.anchor = Anchor::After {
            key: key.clone(),
            id: id.cloned(),
        };
        Ok(())
    }

    fn next(&mut self) -> CoreResult<bool> {
        self.step(Direction::Forward)
    }

    fn previous(&mut self) -> CoreResult<bool> {
        self.step(Direction::Backward)
    }

    fn get(&self) -> CoreResult<IndexEntry<P, S>> {
        self.ensure_open()?;
        match &self.anchor {
            Anchor::On(entry) => Ok(entry.clone()),
            _ => Err(CoreError::InvalidCursorPosition),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.base.close();
            self.delta.close();
            self.closed = true;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
