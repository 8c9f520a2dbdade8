//! Per-caller transaction context.

use crate::cursor::{BoxedCursor, EntryComparator, IndexCursorWrapper, KeyComparator};
use crate::entry::{Entry, EntryId, EntryKey, Value};
use crate::error::{CoreError, CoreResult};
use crate::log::ChangeContainer;
use crate::txn::log_manager::TxnLogManager;
use crate::txn::manager::TxnManager;
use crate::txn::transaction::Transaction;
use crate::types::TxnSeq;
use std::sync::Arc;

/// Holds at most one transaction for one caller.
///
/// Callers that process one operation at a time keep a session each and
/// go through it instead of passing the transaction handle around. The
/// session is `Send` but not shared: concurrent callers use separate
/// sessions over the same manager.
///
/// ```ignore
/// let mut session = TxnSession::new(Arc::clone(&manager));
/// session.begin(false)?;
/// session.log(container, false)?;
/// session.commit()?;
/// ```
#[derive(Debug)]
pub struct TxnSession<K: EntryKey = EntryId> {
    log_manager: TxnLogManager<K>,
    current: Option<Transaction<K>>,
}

impl<K: EntryKey> TxnSession<K> {
    /// Creates a session with no transaction.
    pub fn new(manager: Arc<TxnManager<K>>) -> Self {
        Self {
            log_manager: TxnLogManager::new(manager),
            current: None,
        }
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<TxnManager<K>> {
        self.log_manager.manager()
    }

    /// Begins a transaction and binds it to the session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NestedTransaction`] if one is already bound.
    pub fn begin(&mut self, read_only: bool) -> CoreResult<&Transaction<K>> {
        if let Some(current) = &self.current {
            return Err(CoreError::NestedTransaction {
                current: current.seq(),
            });
        }
        let txn = self.manager().begin(read_only)?;
        Ok(self.current.insert(txn))
    }

    /// The bound transaction, if any.
    #[must_use]
    pub fn current_transaction(&self) -> Option<&Transaction<K>> {
        self.current.as_ref()
    }

    /// Commits the bound transaction and unbinds it.
    ///
    /// The session is unbound afterwards whether or not the commit
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] without a bound
    /// transaction, otherwise whatever [`TxnManager::commit`] returns.
    pub fn commit(&mut self) -> CoreResult<TxnSeq> {
        let mut txn = self.current.take().ok_or(CoreError::NoActiveTransaction)?;
        self.log_manager.manager().commit(&mut txn)
    }

    /// Aborts the bound transaction and unbinds it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] without a bound
    /// transaction.
    pub fn abort(&mut self) -> CoreResult<()> {
        let mut txn = self.current.take().ok_or(CoreError::NoActiveTransaction)?;
        self.log_manager.manager().abort(&mut txn)
    }

    /// Stages a change container on the bound transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] without a bound
    /// transaction, otherwise whatever [`TxnManager::log`] returns.
    pub fn log(&self, container: ChangeContainer<K>, is_index_change: bool) -> CoreResult<()> {
        self.manager().log(self.bound()?, container, is_index_change)
    }

    /// See [`TxnLogManager::merge_updates`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] without a bound
    /// transaction.
    pub fn merge_updates(&self, partition: &str, id: &K, base: Option<Entry>) -> CoreResult<Option<Entry>> {
        self.log_manager.merge_updates(self.bound()?, partition, id, base)
    }

    /// See [`TxnLogManager::wrap_forward`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] without a bound
    /// transaction.
    pub fn wrap_forward<C>(
        &self,
        partition: &str,
        base: BoxedCursor<Value, K>,
        comparator: EntryComparator<C>,
        attribute_oid: &str,
        only_key: Option<Value>,
    ) -> CoreResult<IndexCursorWrapper<Value, K, C>>
    where
        C: KeyComparator<Value>,
    {
        self.log_manager
            .wrap_forward(self.bound()?, partition, base, comparator, attribute_oid, only_key)
    }

    /// See [`TxnLogManager::wrap_reverse`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] without a bound
    /// transaction.
    pub fn wrap_reverse<C>(
        &self,
        partition: &str,
        base: BoxedCursor<K, Value>,
        comparator: EntryComparator<C>,
        attribute_oid: &str,
        only_key: Option<K>,
    ) -> CoreResult<IndexCursorWrapper<K, Value, C>>
    where
        C: KeyComparator<K>,
    {
        self.log_manager
            .wrap_reverse(self.bound()?, partition, base, comparator, attribute_oid, only_key)
    }

    fn bound(&self) -> CoreResult<&Transaction<K>> {
        self.current.as_ref().ok_or(CoreError::NoActiveTransaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::cursor::{IndexCursor, NaturalOrder};
    use crate::log::{IndexChange, LogEdit};
    use crate::store::{MemoryPartition, PartitionStore};
    use crate::types::TxnState;

    const PARTITION: &str = "o=test";

    fn manager() -> Arc<TxnManager<u64>> {
        Arc::new(TxnManager::open(PARTITION, Config::new()).unwrap())
    }

    fn add(id: u64) -> ChangeContainer<u64> {
        ChangeContainer::for_entry(id).with(LogEdit::add_entry(Entry::new(format!("uid={id},o=test"))))
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut session = TxnSession::new(manager());
        let seq = session.begin(false).unwrap().seq();
        let err = session.begin(true).unwrap_err();
        assert!(matches!(err, CoreError::NestedTransaction { current } if current == seq));
        assert_eq!(session.current_transaction().map(Transaction::seq), Some(seq));
    }

    #[test]
    fn operations_without_transaction() {
        let mut session = TxnSession::new(manager());
        assert!(session.current_transaction().is_none());
        assert!(matches!(session.commit(), Err(CoreError::NoActiveTransaction)));
        assert!(matches!(session.abort(), Err(CoreError::NoActiveTransaction)));
        assert!(matches!(session.log(add(1), false), Err(CoreError::NoActiveTransaction)));
        assert!(matches!(
            session.merge_updates(PARTITION, &1, None),
            Err(CoreError::NoActiveTransaction)
        ));
        let store: MemoryPartition<u64> = MemoryPartition::new(PARTITION);
        let err = session
            .wrap_forward(PARTITION, store.forward_scan("cn").unwrap(), EntryComparator::new(NaturalOrder), "cn", None)
            .err();
        assert!(matches!(err, Some(CoreError::NoActiveTransaction)));
    }

    #[test]
    fn commit_unbinds() {
        let mut session = TxnSession::new(manager());
        session.begin(false).unwrap();
        session.log(add(1), false).unwrap();
        session.commit().unwrap();
        assert!(session.current_transaction().is_none());
        session.begin(true).unwrap();
        assert!(session.merge_updates(PARTITION, &1, None).unwrap().is_some());
    }

    #[test]
    fn conflict_unbinds() {
        let tm = manager();
        let mut first = TxnSession::new(Arc::clone(&tm));
        let mut second = TxnSession::new(Arc::clone(&tm));
        first.begin(false).unwrap();
        second.begin(false).unwrap();
        first.log(add(5), false).unwrap();
        second.log(add(5), false).unwrap();

        first.commit().unwrap();
        assert!(second.commit().unwrap_err().is_conflict());
        assert!(second.current_transaction().is_none());
        assert!(second.begin(false).is_ok());
    }

    #[test]
    fn abort_unbinds_and_discards() {
        let tm = manager();
        let mut session = TxnSession::new(Arc::clone(&tm));
        session.begin(false).unwrap();
        session.log(add(1), false).unwrap();
        session.abort().unwrap();
        assert!(session.current_transaction().is_none());
        assert!(tm.registered().is_empty());

        session.begin(true).unwrap();
        assert_eq!(session.merge_updates(PARTITION, &1, None).unwrap(), None);
        assert_eq!(
            session.current_transaction().map(Transaction::state),
            Some(TxnState::Active)
        );
    }

    #[test]
    fn wrap_through_session() {
        let mut session = TxnSession::new(manager());
        let store = MemoryPartition::new(PARTITION);
        store.index("cn", "b", 2);

        session.begin(false).unwrap();
        session
            .log(ChangeContainer::for_indices().with(IndexChange::add("cn", "a", 1)), true)
            .unwrap();
        let mut cursor = session
            .wrap_forward(PARTITION, store.forward_scan("cn").unwrap(), EntryComparator::new(NaturalOrder), "cn", None)
            .unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get().unwrap().id, 1);
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get().unwrap().id, 2);
        assert!(!cursor.next().unwrap());

        let mut reverse = session
            .wrap_reverse(PARTITION, store.reverse_scan("cn").unwrap(), EntryComparator::new(NaturalOrder), "cn", Some(1))
            .unwrap();
        assert!(reverse.next().unwrap());
        assert_eq!(reverse.get().unwrap().id, Value::text("a"));
        assert!(!reverse.next().unwrap());
    }
}
