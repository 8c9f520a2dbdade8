//! Error types for the transactional overlay engine.

use crate::types::{TxnSeq, TxnState};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the engine.
///
/// Three families matter to callers:
///
/// - **Conflict** ([`CoreError::TransactionConflict`]): only from committing a
///   read-write transaction. The transaction is already aborted; retry with a
///   new one.
/// - **Invalid log state** ([`CoreError::InvalidLogState`],
///   [`CoreError::ChecksumMismatch`]): the write-ahead log is corrupt or
///   truncated. Fatal to startup.
/// - **Usage errors** (see [`CoreError::is_usage_error`]): programming
///   mistakes such as nested `begin` or `commit` without a transaction.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] dirtxn_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A change container could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The write-ahead log is corrupt or truncated.
    #[error("invalid log state: {message}")]
    InvalidLogState {
        /// Description of the problem, including the offending offset.
        message: String,
    },

    /// Checksum mismatch on a log record.
    #[error("checksum mismatch at segment {segment} offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Segment number holding the record.
        segment: u64,
        /// Offset of the record inside the segment.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Commit rejected because a concurrent transaction wrote the same data.
    #[error("transaction {txn} conflicts with {peer}")]
    TransactionConflict {
        /// The rejected transaction.
        txn: TxnSeq,
        /// The committed peer whose write set intersects.
        peer: TxnSeq,
    },

    /// `begin` while the session already has a transaction.
    #[error("a transaction is already active in this session: {current}")]
    NestedTransaction {
        /// The transaction that is still active.
        current: TxnSeq,
    },

    /// `commit`, `abort`, `log`, `merge` or `wrap` without a transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Operation on a transaction that has already finished.
    #[error("transaction {txn} is not active (state: {state:?})")]
    TransactionNotActive {
        /// The transaction.
        txn: TxnSeq,
        /// Its current state.
        state: TxnState,
    },

    /// Attempt to stage changes on a read-only transaction.
    #[error("transaction {txn} is read-only")]
    ReadOnlyTransaction {
        /// The transaction.
        txn: TxnSeq,
    },

    /// Transaction handle belongs to a different manager.
    #[error("transaction {txn} is not registered with this manager")]
    ForeignTransaction {
        /// The transaction.
        txn: TxnSeq,
    },

    /// Partition name does not match the manager's partition.
    #[error("unknown partition: {name}")]
    UnknownPartition {
        /// The name that was passed in.
        name: String,
    },

    /// Change container does not fit the way it was staged.
    #[error("invalid change container: {message}")]
    InvalidContainer {
        /// What is wrong with it.
        message: String,
    },

    /// Cursor used after `close()`.
    #[error("cursor is closed")]
    CursorClosed,

    /// `get()` on a cursor that is not positioned on an element.
    #[error("cursor is not positioned on an element")]
    InvalidCursorPosition,
}

impl CoreError {
    /// Creates an invalid log state error.
    pub fn invalid_log_state(message: impl Into<String>) -> Self {
        Self::InvalidLogState {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid container error.
    pub fn invalid_container(message: impl Into<String>) -> Self {
        Self::InvalidContainer {
            message: message.into(),
        }
    }

    /// Returns true for commit-time conflicts.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::TransactionConflict { .. })
    }

    /// Returns true for programming errors that must never be retried.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::NestedTransaction { .. }
                | Self::NoActiveTransaction
                | Self::TransactionNotActive { .. }
                | Self::ReadOnlyTransaction { .. }
                | Self::ForeignTransaction { .. }
                | Self::UnknownPartition { .. }
                | Self::InvalidContainer { .. }
                | Self::CursorClosed
                | Self::InvalidCursorPosition
        )
    }

    /// Returns true if the write-ahead log is unusable.
    #[must_use]
    pub fn is_invalid_log_state(&self) -> bool {
        matches!(
            self,
            Self::InvalidLogState { .. } | Self::ChecksumMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let conflict = CoreError::TransactionConflict {
            txn: TxnSeq::new(2),
            peer: TxnSeq::new(1),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_usage_error());

        assert!(CoreError::NoActiveTransaction.is_usage_error());
        assert!(CoreError::invalid_log_state("bad magic").is_invalid_log_state());
        assert!(!CoreError::codec("x").is_usage_error());
    }

    #[test]
    fn conflict_message_names_both_transactions() {
        let err = CoreError::TransactionConflict {
            txn: TxnSeq::new(7),
            peer: TxnSeq::new(3),
        };
        assert_eq!(err.to_string(), "transaction txn:7 conflicts with txn:3");
    }
}
