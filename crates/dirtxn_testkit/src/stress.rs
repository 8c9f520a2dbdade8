//! Stress tests for DirTxn.
//!
//! These drive one manager from several threads at once and count what
//! happened, so callers can assert on conflicts and throughput.

use crate::fixtures::{commit_entry, TestEngine, PARTITION};
use dirtxn_core::{
    ChangeContainer, CoreError, Entry, LogEdit, LogFlusher, PartitionStore, TxnManager, TxnSession,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total transactions attempted.
    pub total_ops: usize,
    /// Transactions that committed.
    pub successful_ops: usize,
    /// Transactions that failed, conflicts included.
    pub failed_ops: usize,
    /// Failures that were commit conflicts.
    pub conflicts: usize,
    /// Total duration.
    pub duration: Duration,
    /// Transactions per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    #[must_use]
    pub fn new(successful: usize, failed: usize, conflicts: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            conflicts,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total transactions: {}", self.total_ops);
        println!("Committed: {}", self.successful_ops);
        println!("Failed: {} ({} conflicts)", self.failed_ops, self.conflicts);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} txn/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Transactions per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Runs a background flusher at this interval while writers work.
    pub flush_interval: Option<Duration>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            flush_interval: None,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    successful: AtomicUsize,
    failed: AtomicUsize,
    conflicts: AtomicUsize,
}

impl Counters {
    fn record<T>(&self, outcome: &Result<T, CoreError>) {
        match outcome {
            Ok(_) => {
                self.successful.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if e.is_conflict() {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn finish(&self, started: Instant) -> StressTestResult {
        StressTestResult::new(
            self.successful.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.conflicts.load(Ordering::Relaxed),
            started.elapsed(),
        )
    }
}

fn start_flusher(engine: &TestEngine, config: &StressConfig) -> Option<LogFlusher> {
    let interval = config.flush_interval?;
    LogFlusher::spawn(Arc::clone(engine.manager()), Arc::clone(engine.store()), interval).ok()
}

/// Id of the `i`-th entry written by thread `thread` in the disjoint test.
#[must_use]
pub fn disjoint_id(thread: usize, i: usize) -> u64 {
    ((thread as u64) << 32) | i as u64
}

/// Every thread commits its own entries; no two transactions touch the
/// same entry or index pair, so nothing should conflict.
pub fn stress_disjoint_writers(engine: &TestEngine, config: &StressConfig) -> StressTestResult {
    let counters = Arc::new(Counters::default());
    let mut flusher = start_flusher(engine, config);
    let started = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let manager = Arc::clone(engine.manager());
            let counters = Arc::clone(&counters);
            let operations = config.operations;
            thread::spawn(move || {
                for i in 0..operations {
                    let id = disjoint_id(t, i);
                    let outcome = commit_entry(&manager, id, &format!("cn=t{t}i{i},{PARTITION}"));
                    counters.record(&outcome);
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.join();
    }

    let result = counters.finish(started);
    if let Some(flusher) = flusher.as_mut() {
        flusher.stop();
    }
    result
}

fn contended_commit(
    manager: &TxnManager<u64>,
    round: usize,
    thread: usize,
    barrier: &Barrier,
) -> Result<(), CoreError> {
    let txn = manager.begin(false);
    // Every writer of the round holds a transaction before anyone commits.
    barrier.wait();
    let mut txn = txn?;
    let entry = Entry::new(format!("cn=shared,{PARTITION}"))
        .with("description", [format!("round {round} thread {thread}")]);
    manager.log(&txn, ChangeContainer::for_entry(0).with(LogEdit::add_entry(entry)), false)?;
    manager.commit(&mut txn).map(|_| ())
}

/// Every thread rewrites the same entry in lock-step rounds. All writers
/// of a round begin before any of them commits, so each round has exactly
/// one winner and `threads - 1` conflicts.
pub fn stress_contended_writers(engine: &TestEngine, config: &StressConfig) -> StressTestResult {
    let counters = Arc::new(Counters::default());
    let barrier = Arc::new(Barrier::new(config.threads));
    let mut flusher = start_flusher(engine, config);
    let started = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let manager = Arc::clone(engine.manager());
            let counters = Arc::clone(&counters);
            let barrier = Arc::clone(&barrier);
            let operations = config.operations;
            thread::spawn(move || {
                for round in 0..operations {
                    let outcome = contended_commit(&manager, round, t, &barrier);
                    counters.record(&outcome);
                    // Nobody starts the next round until this one is decided.
                    barrier.wait();
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.join();
    }

    let result = counters.finish(started);
    if let Some(flusher) = flusher.as_mut() {
        flusher.stop();
    }
    result
}

/// Readers repeatedly merge entries while a writer commits them in id
/// order. Every reader must see a prefix of the ids that never shrinks; a
/// reader that sees one shrink records a failure and stops.
pub fn stress_readers_with_writers(engine: &TestEngine, config: &StressConfig) -> StressTestResult {
    let counters = Arc::new(Counters::default());
    let writer_done = Arc::new(AtomicBool::new(false));
    let started = Instant::now();
    let ids = config.operations as u64;

    let writer = {
        let manager = Arc::clone(engine.manager());
        let counters = Arc::clone(&counters);
        let writer_done = Arc::clone(&writer_done);
        thread::spawn(move || {
            for id in 0..ids {
                counters.record(&commit_entry(&manager, id, &format!("cn=w{id},{PARTITION}")));
            }
            writer_done.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..config.threads)
        .map(|_| {
            let mut session = TxnSession::new(Arc::clone(engine.manager()));
            let store = Arc::clone(engine.store());
            let counters = Arc::clone(&counters);
            let writer_done = Arc::clone(&writer_done);
            thread::spawn(move || {
                let mut seen_up_to = 0_u64;
                loop {
                    let done = writer_done.load(Ordering::Acquire);
                    match visible_prefix(&mut session, &*store, ids) {
                        Ok(visible) if visible >= seen_up_to => seen_up_to = visible,
                        Ok(_) => {
                            counters.record::<()>(&Err(CoreError::invalid_log_state(
                                "reader saw committed entries disappear",
                            )));
                            return;
                        }
                        Err(e) => {
                            counters.record::<()>(&Err(e));
                            return;
                        }
                    }
                    if done || seen_up_to >= ids {
                        return;
                    }
                }
            })
        })
        .collect();

    let _ = writer.join();
    for reader in readers {
        let _ = reader.join();
    }
    counters.finish(started)
}

/// Number of leading ids `0..ids` one read-only transaction sees.
fn visible_prefix<S>(session: &mut TxnSession<u64>, store: &S, ids: u64) -> Result<u64, CoreError>
where
    S: PartitionStore<u64> + ?Sized,
{
    session.begin(true)?;
    let mut visible = 0;
    for id in 0..ids {
        if session.merge_updates(PARTITION, &id, store.get(&id)?)?.is_none() {
            break;
        }
        visible = id + 1;
    }
    session.commit()?;
    Ok(visible)
}
