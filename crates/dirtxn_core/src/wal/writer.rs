//! Segmented log writer.

use crate::config::Config;
use crate::entry::EntryKey;
use crate::error::CoreResult;
use crate::types::TxnSeq;
use crate::wal::reader::SegmentReader;
use crate::wal::record::WalRecord;
use crate::wal::recovery::{RecoveredLog, Replay};
use dirtxn_storage::{LogVolume, StorageBackend};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Appends record batches to a [`LogVolume`], one segment at a time.
///
/// A batch always lands in a single segment. When the current segment is
/// non-empty and the batch would push it past `max_log_file_size`, the
/// writer starts the next segment first. Each segment remembers the highest
/// sequence number it mentions so that [`WalManager::purge`] can delete
/// segments nobody needs any more.
pub struct WalManager<K> {
    volume: Arc<dyn LogVolume>,
    state: Mutex<WriterState>,
    max_file_size: u64,
    sync_on_commit: bool,
    _marker: PhantomData<fn(K)>,
}

struct WriterState {
    segment: u64,
    backend: Box<dyn StorageBackend>,
    size: u64,
    /// Highest sequence number per segment; `None` for segments without
    /// records.
    segment_max: BTreeMap<u64, Option<TxnSeq>>,
}

impl<K: EntryKey> WalManager<K> {
    /// Opens the log on `volume` and replays every segment.
    ///
    /// Appends continue in the newest segment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidLogState`] or
    /// [`crate::CoreError::ChecksumMismatch`] for any defective record, or a
    /// storage error.
    pub fn open(volume: Arc<dyn LogVolume>, config: &Config) -> CoreResult<(Self, RecoveredLog<K>)> {
        let segments = volume.segments()?;
        let mut replay = Replay::new();
        let mut segment_max = BTreeMap::new();

        for &number in &segments {
            let backend = volume.open_segment(number)?;
            let mut max = None;
            for item in SegmentReader::<K>::open(number, backend.as_ref())? {
                let (_, record) = item?;
                max = max.max(Some(record.max_seq()));
                replay.apply(record);
            }
            segment_max.insert(number, max);
        }

        let current = segments.last().copied().unwrap_or(1);
        let backend = volume.open_segment(current)?;
        let size = backend.size()?;
        segment_max.entry(current).or_insert(None);

        let recovered = replay.finish();
        info!(
            segments = segments.len(),
            records = recovered.records,
            committed = recovered.transactions.len(),
            discarded = recovered.discarded,
            next_seq = %recovered.next_seq,
            "write-ahead log recovered"
        );

        let wal = Self {
            volume,
            state: Mutex::new(WriterState {
                segment: current,
                backend,
                size,
                segment_max,
            }),
            max_file_size: config.max_log_file_size,
            sync_on_commit: config.sync_on_commit,
            _marker: PhantomData,
        };
        Ok((wal, recovered))
    }

    /// Returns true if commits are synced to stable storage.
    #[must_use]
    pub fn sync_on_commit(&self) -> bool {
        self.sync_on_commit
    }

    /// Appends `records` as one batch and returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, rotation, the append or the sync fails.
    pub fn append_batch(&self, records: &[WalRecord<K>], sync: bool) -> CoreResult<u64> {
        let mut data = Vec::new();
        let mut max = None;
        for record in records {
            data.extend_from_slice(&record.encode()?);
            max = max.max(Some(record.max_seq()));
        }
        let len = data.len() as u64;

        let mut state = self.state.lock();
        if state.size > 0 && state.size + len > self.max_file_size {
            self.rotate(&mut state)?;
        }
        state.backend.append(&data)?;
        state.size += len;
        let segment = state.segment;
        let slot = state.segment_max.entry(segment).or_insert(None);
        *slot = (*slot).max(max);
        if sync {
            state.backend.sync()?;
        }
        Ok(len)
    }

    fn rotate(&self, state: &mut WriterState) -> CoreResult<()> {
        if self.sync_on_commit {
            state.backend.sync()?;
        } else {
            state.backend.flush()?;
        }
        let next = state.segment + 1;
        let backend = self.volume.open_segment(next)?;
        state.size = backend.size()?;
        state.backend = backend;
        state.segment = next;
        state.segment_max.entry(next).or_insert(None);
        info!(segment = next, "started new log segment");
        Ok(())
    }

    /// Deletes every segment other than the current one whose records all
    /// precede `low_water`. Returns the deleted segment numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be removed.
    pub fn purge(&self, low_water: TxnSeq) -> CoreResult<Vec<u64>> {
        let mut state = self.state.lock();
        let current = state.segment;
        let doomed: Vec<u64> = state
            .segment_max
            .iter()
            .filter(|(number, max)| **number != current && max.map_or(true, |m| m < low_water))
            .map(|(number, _)| *number)
            .collect();
        for number in &doomed {
            self.volume.remove_segment(*number)?;
            state.segment_max.remove(number);
        }
        if !doomed.is_empty() {
            debug!(segments = ?doomed, low_water = %low_water, "purged log segments");
        }
        Ok(doomed)
    }

    /// Pushes buffered bytes of the current segment out.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> CoreResult<()> {
        self.state.lock().backend.flush()?;
        Ok(())
    }

    /// Number of the segment receiving appends.
    #[must_use]
    pub fn current_segment(&self) -> u64 {
        self.state.lock().segment
    }

    /// Segments still tracked, in ascending order.
    #[must_use]
    pub fn segments(&self) -> Vec<u64> {
        self.state.lock().segment_max.keys().copied().collect()
    }

    /// Size of the current segment in bytes.
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.state.lock().size
    }
}

impl<K> Drop for WalManager<K> {
    fn drop(&mut self) {
        if let Err(e) = self.state.get_mut().backend.flush() {
            warn!(error = %e, "failed to flush log on close");
        }
    }
}
