//! Log-edit model.
//!
//! A transaction records what it changes as [`LogEdit`]s grouped into
//! [`ChangeContainer`]s, one per touched entry plus one for index-only
//! changes. The containers are what the merge path folds onto base-store
//! state, what the write-ahead log persists at commit, and what the flusher
//! finally applies to the base store.

mod changeset;
mod container;
mod edit;

pub use changeset::{ChangeSet, WriteSet};
pub use container::ChangeContainer;
pub use edit::{EditKind, IndexChange, LogEdit};
