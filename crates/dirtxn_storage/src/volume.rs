//! Numbered sets of log files.
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK                 # Advisory lock, one engine per directory
//! ├─ log-00000001.wal
//! ├─ log-00000002.wal     # Started when 00000001 reached its size limit
//! └─ ...
//! ```

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const SEGMENT_PREFIX: &str = "log-";
const SEGMENT_SUFFIX: &str = ".wal";

/// A logical log made of numbered segments.
///
/// Segment numbers increase with age; the log is the concatenation of its
/// segments in ascending order.
pub trait LogVolume: Send + Sync {
    /// Returns the existing segment numbers in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume cannot be listed.
    fn segments(&self) -> StorageResult<Vec<u64>>;

    /// Opens segment `number`, creating it empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment cannot be opened or created.
    fn open_segment(&self, number: u64) -> StorageResult<Box<dyn StorageBackend>>;

    /// Deletes segment `number`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::SegmentNotFound`] if it does not exist.
    fn remove_segment(&self, number: u64) -> StorageResult<()>;
}

/// A directory of log files guarded by an exclusive `LOCK` file.
#[derive(Debug)]
pub struct FileVolume {
    dir: PathBuf,
    buffer_size: usize,
    _lock_file: File,
}

impl FileVolume {
    /// Opens `dir`, creating it if needed, and takes the directory lock.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the lock,
    /// or an I/O error.
    pub fn open(dir: &Path, buffer_size: usize) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: dir.display().to_string(),
            });
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            buffer_size,
            _lock_file: lock_file,
        })
    }

    /// Returns the log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of segment `number`.
    #[must_use]
    pub fn segment_path(&self, number: u64) -> PathBuf {
        self.dir
            .join(format!("{SEGMENT_PREFIX}{number:08}{SEGMENT_SUFFIX}"))
    }

    fn parse_segment_name(name: &str) -> Option<u64> {
        name.strip_prefix(SEGMENT_PREFIX)?
            .strip_suffix(SEGMENT_SUFFIX)?
            .parse()
            .ok()
    }
}

impl LogVolume for FileVolume {
    fn segments(&self) -> StorageResult<Vec<u64>> {
        let mut numbers = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(number) = entry
                .file_name()
                .to_str()
                .and_then(Self::parse_segment_name)
            {
                numbers.push(number);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    fn open_segment(&self, number: u64) -> StorageResult<Box<dyn StorageBackend>> {
        let backend = FileBackend::open(&self.segment_path(number), self.buffer_size)?;
        Ok(Box::new(backend))
    }

    fn remove_segment(&self, number: u64) -> StorageResult<()> {
        let path = self.segment_path(number);
        if !path.exists() {
            return Err(StorageError::SegmentNotFound(number));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

/// An in-memory volume.
///
/// Segments outlive the log that wrote them: reopening a log over the same
/// `MemoryVolume` sees every byte appended before, which is how tests
/// simulate a restart.
#[derive(Debug, Default)]
pub struct MemoryVolume {
    segments: Mutex<BTreeMap<u64, InMemoryBackend>>,
}

impl MemoryVolume {
    /// Creates an empty volume.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle sharing the bytes of segment `number`.
    #[must_use]
    pub fn segment(&self, number: u64) -> Option<InMemoryBackend> {
        self.segments.lock().get(&number).cloned()
    }
}

impl LogVolume for MemoryVolume {
    fn segments(&self) -> StorageResult<Vec<u64>> {
        Ok(self.segments.lock().keys().copied().collect())
    }

    fn open_segment(&self, number: u64) -> StorageResult<Box<dyn StorageBackend>> {
        let backend = self.segments.lock().entry(number).or_default().clone();
        Ok(Box::new(backend))
    }

    fn remove_segment(&self, number: u64) -> StorageResult<()> {
        self.segments
            .lock()
            .remove(&number)
            .map(|_| ())
            .ok_or(StorageError::SegmentNotFound(number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_volume_lists_segments_in_order() {
        let dir = tempdir().unwrap();
        let volume = FileVolume::open(dir.path(), 0).unwrap();
        for n in [3, 1, 2] {
            let mut seg = volume.open_segment(n).unwrap();
            seg.append(&[n as u8]).unwrap();
        }
        assert_eq!(volume.segments().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn file_volume_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let volume = FileVolume::open(dir.path(), 0).unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        volume.open_segment(7).unwrap();
        assert_eq!(volume.segments().unwrap(), vec![7]);
    }

    #[test]
    fn file_volume_is_exclusive() {
        let dir = tempdir().unwrap();
        let _first = FileVolume::open(dir.path(), 0).unwrap();
        let second = FileVolume::open(dir.path(), 0);
        assert!(matches!(second, Err(StorageError::Locked { .. })));
    }

    #[test]
    fn file_volume_remove_segment() {
        let dir = tempdir().unwrap();
        let volume = FileVolume::open(dir.path(), 0).unwrap();
        volume.open_segment(1).unwrap();
        volume.remove_segment(1).unwrap();
        assert!(volume.segments().unwrap().is_empty());
        assert!(matches!(
            volume.remove_segment(1),
            Err(StorageError::SegmentNotFound(1))
        ));
    }

    #[test]
    fn memory_volume_reopen_sees_data() {
        let volume = MemoryVolume::new();
        {
            let mut seg = volume.open_segment(1).unwrap();
            seg.append(b"kept").unwrap();
        }
        let seg = volume.open_segment(1).unwrap();
        assert_eq!(seg.read_at(0, 4).unwrap(), b"kept");
        assert_eq!(volume.segment(1).unwrap().data(), b"kept");
    }
}
