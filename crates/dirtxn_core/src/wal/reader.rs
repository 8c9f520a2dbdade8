//! Sequential record reader over one log segment.

use crate::entry::EntryKey;
use crate::error::{CoreError, CoreResult};
use crate::wal::record::{
    compute_crc32, WalRecord, WalRecordType, CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION,
};
use dirtxn_storage::StorageBackend;
use std::marker::PhantomData;

/// Iterates the records of a segment in append order.
///
/// Yields `(offset, record)` pairs. Every defect ends iteration with an
/// error: a record cut short by a crash is reported as
/// [`CoreError::InvalidLogState`] exactly like bad magic, an unsupported
/// version or an unknown type, and a checksum failure as
/// [`CoreError::ChecksumMismatch`]. Nothing is skipped.
pub struct SegmentReader<K> {
    segment: u64,
    data: Vec<u8>,
    pos: usize,
    finished: bool,
    _marker: PhantomData<fn() -> K>,
}

impl<K: EntryKey> SegmentReader<K> {
    /// Reads the whole segment from `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn open(segment: u64, backend: &dyn StorageBackend) -> CoreResult<Self> {
        let size = backend.size()?;
        let len = usize::try_from(size)
            .map_err(|_| CoreError::invalid_log_state(format!("segment {segment} too large")))?;
        let data = if len == 0 {
            Vec::new()
        } else {
            backend.read_at(0, len)?
        };
        Ok(Self::from_bytes(segment, data))
    }

    /// Wraps bytes already in memory.
    #[must_use]
    pub fn from_bytes(segment: u64, data: Vec<u8>) -> Self {
        Self {
            segment,
            data,
            pos: 0,
            finished: false,
            _marker: PhantomData,
        }
    }

    fn fail(&mut self, message: String) -> CoreError {
        self.finished = true;
        CoreError::invalid_log_state(format!(
            "segment {} offset {}: {message}",
            self.segment, self.pos
        ))
    }

    fn read_record(&mut self) -> CoreResult<Option<(u64, WalRecord<K>)>> {
        let start = self.pos;
        let remaining = self.data.len() - start;
        if remaining == 0 {
            self.finished = true;
            return Ok(None);
        }
        if remaining < HEADER_SIZE {
            return Err(self.fail(format!("truncated header ({remaining} bytes)")));
        }

        let header = &self.data[start..start + HEADER_SIZE];
        if header[..4] != WAL_MAGIC {
            return Err(self.fail("bad magic".to_string()));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version == 0 || version > WAL_VERSION {
            return Err(self.fail(format!("unsupported version {version}")));
        }
        let type_byte = header[6];
        let Some(record_type) = WalRecordType::from_byte(type_byte) else {
            return Err(self.fail(format!("unknown record type {type_byte}")));
        };
        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let total = HEADER_SIZE + len + CRC_SIZE;
        if remaining < total {
            return Err(self.fail(format!(
                "truncated record: need {total} bytes, {remaining} available"
            )));
        }

        let body_end = start + HEADER_SIZE + len;
        let expected = u32::from_le_bytes([
            self.data[body_end],
            self.data[body_end + 1],
            self.data[body_end + 2],
            self.data[body_end + 3],
        ]);
        let actual = compute_crc32(&self.data[start..body_end]);
        if expected != actual {
            self.finished = true;
            return Err(CoreError::ChecksumMismatch {
                segment: self.segment,
                offset: start as u64,
                expected,
                actual,
            });
        }

        let record =
            match WalRecord::decode_payload(record_type, &self.data[start + HEADER_SIZE..body_end]) {
                Ok(record) => record,
                Err(e) => return Err(self.fail(e.to_string())),
            };
        self.pos = start + total;
        Ok(Some((start as u64, record)))
    }
}

impl<K: EntryKey> Iterator for SegmentReader<K> {
    type Item = CoreResult<(u64, WalRecord<K>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.read_record().transpose()
    }
}
