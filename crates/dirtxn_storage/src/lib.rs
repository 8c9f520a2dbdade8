//! # DirTxn Storage
//!
//! Byte-level storage for the DirTxn write-ahead log.
//!
//! Backends are **opaque byte stores**: they append, read back and flush
//! bytes without interpreting them. Log record framing, checksums and
//! recovery all live in `dirtxn_core`.
//!
//! A [`LogVolume`] groups numbered backends into one logical log so the core
//! can rotate to a fresh file when the current one reaches its size limit and
//! drop old files once their contents are no longer needed.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests; clones share the same bytes
//! - [`FileBackend`] - Persistent, with a fixed-size write buffer
//!
//! ## Available Volumes
//!
//! - [`MemoryVolume`] - Survives "restarts" within one process (tests)
//! - [`FileVolume`] - A locked directory of `log-NNNNNNNN.wal` files
//!
//! ## Example
//!
//! ```rust
//! use dirtxn_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod volume;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, DEFAULT_BUFFER_SIZE};
pub use memory::InMemoryBackend;
pub use volume::{FileVolume, LogVolume, MemoryVolume};
