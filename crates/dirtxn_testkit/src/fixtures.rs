//! Test fixtures.
//!
//! A [`TestEngine`] bundles a transaction manager, the in-memory base store
//! it flushes into and, for file-backed engines, the temporary directory
//! holding the log. Engines can be "restarted" with [`TestEngine::reopen`],
//! which keeps the base store and replays the log into a fresh manager.

use dirtxn_core::{
    flush_all, ChangeContainer, Config, CoreResult, Entry, IndexChange, LogEdit, MemoryPartition,
    PartitionStore, TxnManager, TxnSeq, TxnSession,
};
use dirtxn_storage::{LogVolume, MemoryVolume};
use std::sync::Arc;
use tempfile::TempDir;

/// Partition name used by every fixture.
pub const PARTITION: &str = "dc=example,dc=com";

/// Where an engine keeps its log.
#[derive(Debug)]
enum LogLocation {
    Memory(Arc<MemoryVolume>),
    File(TempDir),
}

/// A manager and base store wired together for tests.
#[derive(Debug)]
pub struct TestEngine {
    manager: Arc<TxnManager<u64>>,
    store: Arc<MemoryPartition<u64>>,
    config: Config,
    log: LogLocation,
}

impl TestEngine {
    /// Creates an engine whose log lives in memory.
    ///
    /// # Panics
    ///
    /// Panics if the manager cannot be opened.
    #[must_use]
    pub fn memory() -> Self {
        Self::memory_with(Config::new())
    }

    /// Creates an in-memory engine with `config`.
    ///
    /// Any `log_dir` in `config` is ignored.
    ///
    /// # Panics
    ///
    /// Panics if the manager cannot be opened.
    #[must_use]
    pub fn memory_with(config: Config) -> Self {
        let volume = Arc::new(MemoryVolume::new());
        let manager = open_on_volume(&volume, config.clone()).expect("Failed to open manager");
        Self {
            manager: Arc::new(manager),
            store: Arc::new(MemoryPartition::new(PARTITION)),
            config,
            log: LogLocation::Memory(volume),
        }
    }

    /// Creates an engine logging to a temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the directory or the manager cannot be created.
    #[must_use]
    pub fn file() -> Self {
        Self::file_with(Config::new())
    }

    /// Creates a file-backed engine with `config`; the log directory is
    /// always a fresh temporary one.
    ///
    /// # Panics
    ///
    /// Panics if the directory or the manager cannot be created.
    #[must_use]
    pub fn file_with(config: Config) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = config.log_dir(dir.path());
        let manager = TxnManager::open(PARTITION, config.clone()).expect("Failed to open manager");
        Self {
            manager: Arc::new(manager),
            store: Arc::new(MemoryPartition::new(PARTITION)),
            config,
            log: LogLocation::File(dir),
        }
    }

    /// Simulates a restart: drops the manager and opens a new one over the
    /// same log. The base store is kept.
    ///
    /// Transactions still held elsewhere keep the old manager alive; a
    /// file-backed reopen then fails on the directory lock.
    ///
    /// # Errors
    ///
    /// Returns the recovery error of the new manager.
    pub fn reopen(self) -> CoreResult<Self> {
        let Self {
            manager,
            store,
            config,
            log,
        } = self;
        drop(manager);
        let manager = match &log {
            LogLocation::Memory(volume) => open_on_volume(volume, config.clone())?,
            LogLocation::File(_) => TxnManager::open(PARTITION, config.clone())?,
        };
        Ok(Self {
            manager: Arc::new(manager),
            store,
            config,
            log,
        })
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<TxnManager<u64>> {
        &self.manager
    }

    /// Returns the base store.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryPartition<u64>> {
        &self.store
    }

    /// Returns the in-memory log volume, if the engine has one.
    #[must_use]
    pub fn volume(&self) -> Option<&Arc<MemoryVolume>> {
        match &self.log {
            LogLocation::Memory(volume) => Some(volume),
            LogLocation::File(_) => None,
        }
    }

    /// Returns a new session over the manager.
    #[must_use]
    pub fn session(&self) -> TxnSession<u64> {
        TxnSession::new(Arc::clone(&self.manager))
    }

    /// Commits one transaction adding entry `id` and its `cn` index pair.
    ///
    /// # Errors
    ///
    /// Returns the commit error.
    pub fn commit_entry(&self, id: u64, dn: &str) -> CoreResult<TxnSeq> {
        commit_entry(&self.manager, id, dn)
    }

    /// Reads entry `id` the way a fresh read-only transaction sees it.
    ///
    /// # Errors
    ///
    /// Returns any store or transaction error.
    pub fn visible_entry(&self, id: u64) -> CoreResult<Option<Entry>> {
        let mut session = self.session();
        session.begin(true)?;
        let entry = session.merge_updates(PARTITION, &id, self.store.get(&id)?)?;
        session.commit()?;
        Ok(entry)
    }

    /// Flushes until nothing is left to flush.
    ///
    /// # Errors
    ///
    /// Returns the first flush error.
    pub fn flush(&self) -> CoreResult<usize> {
        flush_all(&self.manager, &*self.store)
    }
}

fn open_on_volume(volume: &Arc<MemoryVolume>, config: Config) -> CoreResult<TxnManager<u64>> {
    let volume: Arc<dyn LogVolume> = Arc::clone(volume) as Arc<dyn LogVolume>;
    TxnManager::with_volume(PARTITION, config, volume)
}

/// The `cn` value fixtures index entries under.
#[must_use]
pub fn common_name(dn: &str) -> &str {
    dn.split(',')
        .next()
        .and_then(|rdn| rdn.strip_prefix("cn="))
        .unwrap_or(dn)
}

/// Builds the entry fixtures add for `dn`.
#[must_use]
pub fn fixture_entry(dn: &str) -> Entry {
    Entry::new(dn)
        .with("objectClass", ["person"])
        .with("cn", [common_name(dn)])
}

/// Builds the two containers that add entry `id`: the entry itself and its
/// `cn` index pair.
#[must_use]
pub fn add_entry_containers(id: u64, dn: &str) -> [ChangeContainer<u64>; 2] {
    [
        ChangeContainer::for_entry(id).with(LogEdit::add_entry(fixture_entry(dn))),
        ChangeContainer::for_indices().with(IndexChange::add("cn", common_name(dn), id)),
    ]
}

/// Commits one transaction on `manager` adding entry `id`.
///
/// # Errors
///
/// Returns the commit error; the transaction is aborted on failure.
pub fn commit_entry(manager: &TxnManager<u64>, id: u64, dn: &str) -> CoreResult<TxnSeq> {
    let mut txn = manager.begin(false)?;
    let [entry, index] = add_entry_containers(id, dn);
    manager.log(&txn, entry, false)?;
    manager.log(&txn, index, true)?;
    manager.commit(&mut txn)
}

/// Runs `f` against a fresh in-memory engine.
pub fn with_engine<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine) -> R,
{
    let engine = TestEngine::memory();
    f(&engine)
}

/// Runs `f` against a fresh file-backed engine.
pub fn with_file_engine<F, R>(f: F) -> R
where
    F: FnOnce(&TestEngine) -> R,
{
    let engine = TestEngine::file();
    f(&engine)
}

/// Prebuilt data sets.
pub mod scenarios {
    use super::*;

    /// Common names of the people in [`people`].
    pub const PEOPLE: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

    /// Fills the base store directly with the people in [`PEOPLE`], ids
    /// `1..=5`, indexed on `cn`. Nothing goes through a transaction.
    pub fn people(engine: &TestEngine) {
        for (id, cn) in (1..).zip(PEOPLE) {
            engine
                .store()
                .insert_indexed(id, fixture_entry(&format!("cn={cn},{PARTITION}")));
        }
    }

    /// Commits `count` entries with ids `first..first + count`, one
    /// transaction each.
    ///
    /// # Errors
    ///
    /// Returns the first commit error.
    pub fn committed_entries(engine: &TestEngine, first: u64, count: u64) -> CoreResult<Vec<TxnSeq>> {
        (first..first + count)
            .map(|id| engine.commit_entry(id, &format!("cn=user{id},{PARTITION}")))
            .collect()
    }
}
