//! Background flushing.

use crate::entry::EntryKey;
use crate::error::CoreResult;
use crate::store::PartitionStore;
use crate::txn::TxnManager;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wakes the flusher thread early when it should stop.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.condvar.notify_all();
    }

    /// Sleeps for at most `interval`. Returns true once stop was requested.
    fn wait(&self, interval: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.condvar.wait_for(&mut stopped, interval);
        }
        *stopped
    }
}

/// Runs [`TxnManager::flush`] periodically on a dedicated thread.
///
/// The thread stops on [`LogFlusher::stop`] or when the flusher is dropped.
/// A failed flush is logged and retried on the next tick.
#[derive(Debug)]
pub struct LogFlusher {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl LogFlusher {
    /// Starts flushing `manager` into `store` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<K, S>(manager: Arc<TxnManager<K>>, store: Arc<S>, interval: Duration) -> io::Result<Self>
    where
        K: EntryKey,
        S: PartitionStore<K> + ?Sized + 'static,
    {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let handle = thread::Builder::new()
            .name(format!("dirtxn-flush-{}", manager.partition()))
            .spawn(move || {
                info!(partition = manager.partition(), ?interval, "log flusher started");
                while !thread_signal.wait(interval) {
                    match manager.flush(&*store) {
                        Ok(0) => {}
                        Ok(n) => debug!(flushed = n, "background flush"),
                        Err(e) => warn!(error = %e, "background flush failed"),
                    }
                }
                info!(partition = manager.partition(), "log flusher stopped");
            })?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Starts a flusher with `manager`'s configured interval, or returns
    /// `None` when the interval is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn from_config<K, S>(manager: Arc<TxnManager<K>>, store: Arc<S>) -> io::Result<Option<Self>>
    where
        K: EntryKey,
        S: PartitionStore<K> + ?Sized + 'static,
    {
        let interval = manager.config().flush_interval;
        if interval.is_zero() {
            return Ok(None);
        }
        Self::spawn(manager, store, interval).map(Some)
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("log flusher thread panicked");
            }
        }
    }

    /// Returns true while the thread runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for LogFlusher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Flushes until nothing is left to flush.
///
/// Returns the total number of transactions flushed.
///
/// # Errors
///
/// Returns the first flush error.
pub fn flush_all<K, S>(manager: &TxnManager<K>, store: &S) -> CoreResult<usize>
where
    K: EntryKey,
    S: PartitionStore<K> + ?Sized,
{
    let mut total = 0;
    loop {
        match manager.flush(store)? {
            0 => return Ok(total),
            n => total += n,
        }
    }
}
