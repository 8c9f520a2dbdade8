//! The persistent store a partition's transactions overlay.
//!
//! The engine never assumes an on-disk layout. It needs identifier-keyed
//! point lookups, positionable ordered cursors over each attribute's forward
//! and reverse index, and a way to apply a committed change container when
//! flushing.

mod index;
mod memory;

pub use index::AttributeIndex;
pub use memory::MemoryPartition;

use crate::cursor::BoxedCursor;
use crate::entry::{Entry, EntryKey, Value};
use crate::error::CoreResult;
use crate::log::ChangeContainer;

/// Base-store interface.
///
/// Implementations must tolerate concurrent readers while `apply` runs and
/// must make `apply` idempotent: applying a container twice leaves the
/// store as applying it once.
pub trait PartitionStore<K: EntryKey>: Send + Sync {
    /// Looks up an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, id: &K) -> CoreResult<Option<Entry>>;

    /// Opens a cursor over the `(value, id)` index of `attribute_oid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn forward_scan(&self, attribute_oid: &str) -> CoreResult<BoxedCursor<Value, K>>;

    /// Opens a cursor over the `(id, value)` index of `attribute_oid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn reverse_scan(&self, attribute_oid: &str) -> CoreResult<BoxedCursor<K, Value>>;

    /// Applies a committed change container.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn apply(&self, container: &ChangeContainer<K>) -> CoreResult<()>;
}
