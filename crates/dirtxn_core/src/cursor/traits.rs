//! The index cursor trait.

use crate::cursor::order::IndexEntry;
use crate::error::CoreResult;

/// A bidirectional, positionable cursor over an ordered index.
///
/// A cursor sits either on an element or in the gap between two elements.
/// `next` and `previous` move one element and return `false`, without
/// failing, when there is nothing more in that direction. Every method
/// other than `close` and `is_closed` fails with
/// [`crate::CoreError::CursorClosed`] once the cursor is closed.
pub trait IndexCursor<P, S>: Send {
    /// Positions before the first element.
    ///
    /// # Errors
    ///
    /// Fails if the cursor is closed.
    fn before_first(&mut self) -> CoreResult<()>;

    /// Positions after the last element.
    ///
    /// # Errors
    ///
    /// Fails if the cursor is closed.
    fn after_last(&mut self) -> CoreResult<()>;

    /// Positions so that `next` returns the first element at or after
    /// `(key, id)`. With no `id`, that is the first element whose key is
    /// `key` or later.
    ///
    /// # Errors
    ///
    /// Fails if the cursor is closed.
    fn before_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()>;

    /// Positions so that `next` returns the first element strictly after
    /// `(key, id)`. With no `id`, every element whose key is `key` is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Fails if the cursor is closed.
    fn after_value(&mut self, id: Option<&S>, key: &P) -> CoreResult<()>;

    /// Moves to the next element.
    ///
    /// # Errors
    ///
    /// Fails if the cursor is closed.
    fn next(&mut self) -> CoreResult<bool>;

    /// Moves to the previous element.
    ///
    /// # Errors
    ///
    /// Fails if the cursor is closed.
    fn previous(&mut self) -> CoreResult<bool>;

    /// Returns the element the cursor is on.
    ///
    /// # Errors
    ///
    /// [`crate::CoreError::InvalidCursorPosition`] when not on an element.
    fn get(&self) -> CoreResult<IndexEntry<P, S>>;

    /// Releases the cursor. Closing twice is a no-op.
    fn close(&mut self);

    /// Returns true once closed.
    fn is_closed(&self) -> bool;
}

/// Owned, type-erased cursor.
pub type BoxedCursor<P, S> = Box<dyn IndexCursor<P, S>>;
