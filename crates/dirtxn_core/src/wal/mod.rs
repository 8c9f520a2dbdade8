//! Write-ahead log.
//!
//! Every committed read-write transaction is made durable by appending its
//! change containers and a commit marker as one batch. Once the flusher has
//! applied a transaction to the base store it appends a `Flushed` marker,
//! and segments that only mention reclaimed transactions are deleted.
//!
//! ## Record format
//!
//! ```text
//! | magic "DTXL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The checksum covers everything before
//! it. `Changes` payloads carry the container as CBOR.
//!
//! ## Recovery
//!
//! Segments are read in ascending order. Any defect (bad magic, unsupported
//! version, unknown type, checksum mismatch, malformed payload, or a record
//! cut short) fails recovery. A committed transaction without a `Flushed`
//! marker is rebuilt; a batch without a commit marker is dropped.

mod reader;
mod record;
mod recovery;
mod writer;

pub use reader::SegmentReader;
pub use record::{compute_crc32, WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
pub use recovery::{RecoveredLog, RecoveredTxn};
pub use writer::WalManager;
