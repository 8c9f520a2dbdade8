//! Transactions.
//!
//! DirTxn runs optimistic transactions over one partition:
//! - **Isolation**: a transaction sees the changes of every transaction
//!   that committed before it began, plus its own
//! - **Conflicts**: detected at commit, per entry identifier and per index
//!   pair; the later committer is aborted
//! - **Durability**: a read-write commit is one batch in the write-ahead log
//!
//! [`TxnManager`] owns the registry of read-write transactions,
//! [`TxnLogManager`] folds pending changes over base-store reads, and
//! [`TxnSession`] binds one transaction to one caller at a time.

mod log_manager;
mod manager;
mod record;
mod registry;
mod session;
mod transaction;

pub use log_manager::TxnLogManager;
pub use manager::TxnManager;
pub use session::TxnSession;
pub use transaction::Transaction;
