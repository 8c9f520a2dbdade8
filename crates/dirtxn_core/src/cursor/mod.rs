//! Index cursors.
//!
//! A base-store index is read through an [`IndexCursor`]. The index changes
//! a transaction can see but the base store does not hold yet are gathered
//! into a [`DeltaCursor`], and an [`IndexCursorWrapper`] merges the two into
//! one ordered, duplicate-free stream that honours deletes.
//!
//! Forward indices are `IndexCursor<Value, K>` (value, then entry id);
//! reverse indices are `IndexCursor<K, Value>`.

mod delta;
mod order;
mod sorted;
mod traits;
mod wrapper;

pub use delta::DeltaCursor;
pub use order::{EntryComparator, IndexEntry, KeyComparator, NaturalOrder, Reversed};
pub use sorted::SortedCursor;
pub use traits::{BoxedCursor, IndexCursor};
pub use wrapper::IndexCursorWrapper;
