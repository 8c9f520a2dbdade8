//! Buffered file storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default size of the in-memory write buffer (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A file-backed byte store with a fixed-size write buffer.
///
/// Appends accumulate in memory until the buffer reaches `buffer_size`
/// bytes, at which point the whole buffer is written to the file in one
/// call. `flush()` drains a partially filled buffer. Reads transparently
/// cover bytes that are still buffered.
///
/// # Durability
///
/// - `flush()` writes the buffer and calls `File::flush()`
/// - `sync()` additionally calls `File::sync_all()`
///
/// # Example
///
/// ```no_run
/// use dirtxn_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("log-00000001.wal"), 4096).unwrap();
/// backend.append(b"record").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: File,
    /// Bytes already written to the file.
    written: u64,
    /// Bytes appended but not yet written.
    pending: Vec<u8>,
    buffer_size: usize,
}

impl Inner {
    fn drain(&mut self) -> StorageResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.written))?;
        self.file.write_all(&self.pending)?;
        self.written += self.pending.len() as u64;
        self.pending.clear();
        Ok(())
    }

    fn size(&self) -> u64 {
        self.written + self.pending.len() as u64
    }
}

impl FileBackend {
    /// Opens or creates the file at `path`.
    ///
    /// A `buffer_size` of zero disables buffering: every append is written
    /// straight through.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path, buffer_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                file,
                written,
                pending: Vec::with_capacity(buffer_size),
                buffer_size,
            }),
        })
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of bytes waiting in the write buffer.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size();
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        let mut out = Vec::with_capacity(len);
        if offset < inner.written {
            let from_file = (inner.written.min(end) - offset) as usize;
            let mut buf = vec![0u8; from_file];
            inner.file.seek(SeekFrom::Start(offset))?;
            inner.file.read_exact(&mut buf)?;
            out.extend_from_slice(&buf);
        }
        if end > inner.written {
            let start = offset.max(inner.written) - inner.written;
            let stop = end - inner.written;
            out.extend_from_slice(&inner.pending[start as usize..stop as usize]);
        }
        Ok(out)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let inner = self.inner.get_mut();
        let offset = inner.size();
        if data.is_empty() {
            return Ok(offset);
        }
        inner.pending.extend_from_slice(data);
        if inner.pending.len() >= inner.buffer_size {
            inner.drain()?;
        }
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let inner = self.inner.get_mut();
        inner.drain()?;
        inner.file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.flush()?;
        self.inner.get_mut().file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let inner = self.inner.get_mut();
        let size = inner.size();
        if new_size > size {
            return Err(StorageError::TruncatePastEnd {
                requested: new_size,
                size,
            });
        }
        inner.drain()?;
        inner.file.set_len(new_size)?;
        inner.written = new_size;
        Ok(())
    }
}
