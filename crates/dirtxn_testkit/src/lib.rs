//! # DirTxn Testkit
//!
//! Test utilities for DirTxn.
//!
//! This crate provides:
//! - Engine fixtures over memory or file-backed logs
//! - Property-based test generators
//! - A reference model of index merging
//! - Stress drivers for concurrent writers
//! - Crash simulation for the write-ahead log
//!
//! ## Example
//!
//! ```rust
//! use dirtxn_testkit::prelude::*;
//!
//! let engine = TestEngine::memory();
//! engine.commit_entry(1, "cn=one").unwrap();
//! assert_eq!(engine.visible_entry(1).unwrap().map(|e| e.dn().to_string()), Some("cn=one".to_string()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod model;
pub mod stress;

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use stress::*;

/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Common imports for tests.
pub mod prelude {
    pub use crate::crash::{CrashRecoveryResult, CrashableVolume};
    pub use crate::fixtures::{scenarios, with_engine, TestEngine, PARTITION};
    pub use crate::generators::{
        arb_index_changes, arb_modification, arb_value, PropTestConfig,
    };
    pub use crate::init_tracing;
    pub use crate::model::{reference_merge, ReferenceIndex};
    pub use crate::stress::{StressConfig, StressTestResult};
    pub use dirtxn_core::{
        ChangeContainer, Config, CoreError, Entry, IndexChange, IndexCursor, LogEdit,
        MemoryPartition, Modification, PartitionStore, TxnManager, TxnSession, Value,
    };
}
