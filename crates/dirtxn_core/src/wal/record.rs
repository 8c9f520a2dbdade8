//! Log record types and their binary form.

use crate::entry::EntryKey;
use crate::error::{CoreError, CoreResult};
use crate::log::ChangeContainer;
use crate::types::TxnSeq;

/// Magic bytes opening every record.
pub const WAL_MAGIC: [u8; 4] = *b"DTXL";

/// Current record format version.
pub const WAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// One change container of a transaction.
    Changes = 1,
    /// Commit marker closing a transaction's batch.
    Commit = 2,
    /// The transaction has been applied to the base store.
    Flushed = 3,
}

impl WalRecordType {
    /// Parses a type byte.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Changes),
            2 => Some(Self::Commit),
            3 => Some(Self::Flushed),
            _ => None,
        }
    }

    /// Returns the type byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord<K> {
    /// A change container staged by `txn`.
    Changes {
        /// Transaction that staged the container.
        txn: TxnSeq,
        /// The container.
        container: ChangeContainer<K>,
    },
    /// `txn` committed with sequence number `commit`.
    Commit {
        /// The transaction.
        txn: TxnSeq,
        /// Its commit sequence number.
        commit: TxnSeq,
    },
    /// `txn` has been applied to the base store and needs no replay.
    Flushed {
        /// The transaction.
        txn: TxnSeq,
        /// Highest sequence number allocated when the marker was written.
        /// Keeps the counter from going backwards once older segments are
        /// purged.
        last_seq: TxnSeq,
    },
}

impl<K: EntryKey> WalRecord<K> {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Changes { .. } => WalRecordType::Changes,
            Self::Commit { .. } => WalRecordType::Commit,
            Self::Flushed { .. } => WalRecordType::Flushed,
        }
    }

    /// Returns the transaction the record belongs to.
    #[must_use]
    pub fn txn(&self) -> TxnSeq {
        match self {
            Self::Changes { txn, .. } | Self::Commit { txn, .. } | Self::Flushed { txn, .. } => *txn,
        }
    }

    /// Highest sequence number mentioned by the record.
    #[must_use]
    pub fn max_seq(&self) -> TxnSeq {
        match self {
            Self::Commit { txn, commit } => (*txn).max(*commit),
            Self::Flushed { txn, last_seq } => (*txn).max(*last_seq),
            Self::Changes { txn, .. } => *txn,
        }
    }

    /// Serializes the payload.
    ///
    /// `Changes` carries the transaction as a little-endian `u64` followed by
    /// the CBOR-encoded container. The other records are fixed-width
    /// little-endian `u64`s.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the container cannot be encoded.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            Self::Changes { txn, container } => {
                buf.extend_from_slice(&txn.as_u64().to_le_bytes());
                ciborium::into_writer(container, &mut buf)
                    .map_err(|e| CoreError::codec(format!("encode container: {e}")))?;
            }
            Self::Commit { txn, commit } => {
                buf.extend_from_slice(&txn.as_u64().to_le_bytes());
                buf.extend_from_slice(&commit.as_u64().to_le_bytes());
            }
            Self::Flushed { txn, last_seq } => {
                buf.extend_from_slice(&txn.as_u64().to_le_bytes());
                buf.extend_from_slice(&last_seq.as_u64().to_le_bytes());
            }
        }
        Ok(buf)
    }

    /// Deserializes a payload of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLogState`] for short or oversized payloads
    /// and a codec error for an undecodable container.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let seq_at = |at: usize| -> CoreResult<TxnSeq> {
            payload
                .get(at..at + 8)
                .and_then(|b| <[u8; 8]>::try_from(b).ok())
                .map(|b| TxnSeq::new(u64::from_le_bytes(b)))
                .ok_or_else(|| CoreError::invalid_log_state("unexpected end of payload"))
        };
        let exact = |len: usize| -> CoreResult<()> {
            if payload.len() == len {
                Ok(())
            } else {
                Err(CoreError::invalid_log_state(format!(
                    "{record_type:?} payload is {} bytes, expected {len}",
                    payload.len()
                )))
            }
        };

        match record_type {
            WalRecordType::Changes => {
                let txn = seq_at(0)?;
                let container = ciborium::from_reader(&payload[8..])
                    .map_err(|e| CoreError::codec(format!("decode container: {e}")))?;
                Ok(Self::Changes { txn, container })
            }
            WalRecordType::Commit => {
                exact(16)?;
                Ok(Self::Commit {
                    txn: seq_at(0)?,
                    commit: seq_at(8)?,
                })
            }
            WalRecordType::Flushed => {
                exact(16)?;
                Ok(Self::Flushed {
                    txn: seq_at(0)?,
                    last_seq: seq_at(8)?,
                })
            }
        }
    }

    /// Serializes the record with its envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or exceeds 4 GiB.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::codec("record payload exceeds 4 GiB"))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.push(self.record_type().as_byte());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        Ok(data)
    }
}

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 0 {
                crc >> 1
            } else {
                (crc >> 1) ^ 0xEDB8_8320
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}
