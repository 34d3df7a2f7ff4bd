//! The local store handle.

use crate::error::{CoreError, CoreResult};
use crate::executor::{QueryResult, StatementExecutor};
use crate::outbox::{self, OutboxRecord};
use crate::registry::StatementRegistry;
use crate::schema;
use crate::transaction::{SyncTransaction, Transaction};
use parking_lot::{Mutex, MutexGuard, RwLock};
use qcsync_codec::Value;
use std::ops::{Deref, DerefMut};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// A local store kept in sync with a remote one.
///
/// The store owns the statement executor behind a single exclusive
/// permit. Every write sequence, outbox read and sync round holds that
/// permit for its whole duration, so statement executions from two
/// sequences never interleave.
///
/// ## Single-Writer Guarantee
///
/// Only one [`Transaction`] exists at a time. [`LocalStore::begin`]
/// blocks while another thread holds one. Operations inside an open
/// transaction go through the transaction handle; calling a store-level
/// operation from the thread that already holds the permit fails with
/// [`CoreError::TransactionActive`] instead of deadlocking.
///
/// # Example
///
/// ```
/// use qcsync_core::{LocalStore, MemoryExecutor};
/// use qcsync_codec::Value;
///
/// let store = LocalStore::open(MemoryExecutor::new()).unwrap();
/// store.register("addItem", "INSERT INTO t VALUES(?1)");
///
/// store.set_data("addItem", &[Value::from("x")]).unwrap();
/// assert_eq!(store.pending_count().unwrap(), 1);
/// ```
pub struct LocalStore<E: StatementExecutor> {
    /// The exclusive permit and the executor it guards.
    executor: Mutex<E>,
    /// Thread currently holding the permit.
    owner: Mutex<Option<ThreadId>>,
    /// Statement templates. Batches are applied under one write lock.
    registry: RwLock<StatementRegistry>,
}

impl<E: StatementExecutor> LocalStore<E> {
    /// Opens a store on `executor`, creating the sync tables if needed.
    pub fn open(executor: E) -> CoreResult<Self> {
        let store = Self {
            executor: Mutex::new(executor),
            owner: Mutex::new(None),
            registry: RwLock::new(StatementRegistry::new()),
        };

        store.transaction(|txn| {
            txn.execute_raw(schema::CREATE_SYNC_INFO)?;
            txn.execute_raw(schema::CREATE_SYNC_VALUES)?;
            Ok(())
        })?;
        debug!("sync tables ready");

        Ok(store)
    }

    /// Registers a statement template under `name`.
    pub fn register(&self, name: impl Into<String>, template: impl Into<String>) {
        let name = name.into();
        if self.registry.write().register(name.clone(), template).is_some() {
            debug!(statement = %name, "statement re-registered");
        }
    }

    /// Registers several templates as one batch.
    ///
    /// Readers never observe a partially applied batch.
    pub fn register_many<I, K, V>(&self, statements: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.registry.write().register_many(statements);
    }

    /// Returns the template registered under `name`.
    pub fn resolve(&self, name: &str) -> CoreResult<String> {
        self.registry.read().resolve(name).map(str::to_string)
    }

    /// Returns a copy of the registry.
    pub fn registry(&self) -> StatementRegistry {
        self.registry.read().clone()
    }

    /// Begins a write sequence.
    ///
    /// Blocks until the permit is free. The returned transaction rolls
    /// back if dropped without [`Transaction::commit`].
    pub fn begin(&self) -> CoreResult<Transaction<'_, E>> {
        let permit = self.acquire()?;
        Transaction::start(self, permit)
    }

    /// Runs `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_, E>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut txn = self.begin()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback() {
                    warn!(error = %rollback_err, "rollback after failure also failed");
                }
                Err(err)
            }
        }
    }

    /// Executes a registered write and records it in the outbox, in a
    /// transaction of its own.
    ///
    /// Inside an explicit transaction use [`Transaction::set_data`].
    pub fn set_data(&self, name: &str, args: &[Value]) -> CoreResult<QueryResult> {
        self.transaction(|txn| txn.set_data(name, args))
    }

    /// Runs a registered query. Queries are never recorded in the outbox.
    pub fn get_data(&self, name: &str, args: &[Value]) -> CoreResult<QueryResult> {
        let sql = self.resolve(name)?;
        self.exclusive(|executor| executor.execute(&sql, args))
    }

    /// Snapshot of the outbox in commit order.
    pub fn pending(&self) -> CoreResult<Vec<OutboxRecord>> {
        self.exclusive(|executor| outbox::drain(executor))
    }

    /// Number of records in the outbox.
    pub fn pending_count(&self) -> CoreResult<usize> {
        self.exclusive(|executor| outbox::count(executor))
    }

    /// The stored watermark text, if a sync round has ever completed.
    pub fn last_sync(&self) -> CoreResult<Option<String>> {
        self.exclusive(|executor| outbox::read_last_sync(executor))
    }

    /// Deletes every outbox record. Returns how many were removed.
    ///
    /// Pending writes are lost for good; this is for maintenance only.
    pub fn clear_outbox(&self) -> CoreResult<usize> {
        let removed = self.transaction(|txn| txn.clear_outbox())?;
        debug!(removed, "outbox cleared");
        Ok(removed)
    }

    /// Begins the transaction a sync round runs in.
    pub fn begin_sync(&self) -> CoreResult<SyncTransaction<'_, E>> {
        self.begin().map(SyncTransaction::new)
    }

    /// Returns true while some thread holds the permit.
    pub fn is_busy(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// Runs `f` with the executor while holding the permit, outside any transaction.
    fn exclusive<T>(&self, f: impl FnOnce(&mut E) -> CoreResult<T>) -> CoreResult<T> {
        let mut permit = self.acquire()?;
        f(&mut permit)
    }

    fn acquire(&self) -> CoreResult<Permit<'_, E>> {
        let me = thread::current().id();
        if *self.owner.lock() == Some(me) {
            return Err(CoreError::TransactionActive);
        }
        let executor = self.executor.lock();
        *self.owner.lock() = Some(me);
        Ok(Permit {
            owner: &self.owner,
            executor,
        })
    }
}

/// Exclusive access to the executor. Clears the owner before the lock is released.
pub(crate) struct Permit<'a, E: StatementExecutor> {
    owner: &'a Mutex<Option<ThreadId>>,
    executor: MutexGuard<'a, E>,
}

impl<E: StatementExecutor> Deref for Permit<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.executor
    }
}

impl<E: StatementExecutor> DerefMut for Permit<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.executor
    }
}

impl<E: StatementExecutor> Drop for Permit<'_, E> {
    fn drop(&mut self) {
        *self.owner.lock() = None;
    }
}
