//! # DirTxn Core
//!
//! Transactional overlay engine for one directory-server partition.
//!
//! Writers never touch the base store directly. Each read-write transaction
//! records its changes as change containers; readers fold the containers
//! they are allowed to see over what the base store returns, both for
//! point lookups and for index scans. Committed transactions are made
//! durable in a write-ahead log and later flushed into the base store.
//!
//! This crate provides:
//! - Entry, value and modification model
//! - Log edits and change containers
//! - Write-ahead log with rotation and strict recovery
//! - Transaction manager with commit-time conflict detection
//! - Entry merge and index cursor overlays
//! - Persistent-store interface with an in-memory implementation
//! - Flushing and reclamation, in the foreground or on a background thread
//!
//! ## Example
//!
//! ```rust
//! use dirtxn_core::{
//!     ChangeContainer, Config, Entry, LogEdit, MemoryPartition, PartitionStore, TxnManager,
//!     TxnSession,
//! };
//! use std::sync::Arc;
//!
//! let manager: Arc<TxnManager<u64>> = Arc::new(TxnManager::open("dc=example", Config::new())?);
//! let store: MemoryPartition<u64> = MemoryPartition::new("dc=example");
//!
//! let mut writer = TxnSession::new(Arc::clone(&manager));
//! writer.begin(false)?;
//! let entry = Entry::new("cn=foo,dc=example").with("cn", ["foo"]);
//! writer.log(ChangeContainer::for_entry(1).with(LogEdit::add_entry(entry.clone())), false)?;
//! writer.commit()?;
//!
//! let mut reader = TxnSession::new(Arc::clone(&manager));
//! reader.begin(true)?;
//! let seen = reader.merge_updates("dc=example", &1, store.get(&1)?)?;
//! assert_eq!(seen, Some(entry));
//! reader.commit()?;
//!
//! manager.flush(&store)?;
//! assert!(store.get(&1)?.is_some());
//! # Ok::<(), dirtxn_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod cursor;
mod entry;
mod error;
mod flusher;
pub mod log;
mod stats;
pub mod store;
mod txn;
mod types;
pub mod wal;

pub use config::Config;
pub use cursor::{
    BoxedCursor, DeltaCursor, EntryComparator, IndexCursor, IndexCursorWrapper, IndexEntry,
    KeyComparator, NaturalOrder, Reversed, SortedCursor,
};
pub use entry::{Entry, EntryId, EntryKey, Modification, Value};
pub use error::{CoreError, CoreResult};
pub use flusher::{flush_all, LogFlusher};
pub use log::{ChangeContainer, ChangeSet, EditKind, IndexChange, LogEdit, WriteSet};
pub use stats::{StatsSnapshot, TxnStats};
pub use store::{AttributeIndex, MemoryPartition, PartitionStore};
pub use txn::{Transaction, TxnLogManager, TxnManager, TxnSession};
pub use types::{TxnSeq, TxnState};
pub use wal::{RecoveredLog, RecoveredTxn, WalManager, WalRecord};
