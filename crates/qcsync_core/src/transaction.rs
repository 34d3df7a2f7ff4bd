//! Guarded transactions over the local store.

use crate::error::{CoreError, CoreResult};
use crate::executor::{QueryResult, StatementExecutor};
use crate::outbox::{self, OutboxRecord};
use crate::store::{LocalStore, Permit};
use qcsync_codec::Value;
use tracing::{debug, warn};

/// An open write sequence holding the store's exclusive permit.
///
/// Any failure inside the transaction marks it failed. A failed
/// transaction never reaches the executor again: further operations
/// return [`CoreError::TransactionFailed`], and [`Transaction::commit`]
/// rolls back and reports the same. Some executor failures end the
/// underlying transaction on their own, so a statement sent after one
/// would run outside it.
/// Dropping an unfinished transaction rolls it back.
pub struct Transaction<'a, E: StatementExecutor> {
    store: &'a LocalStore<E>,
    permit: Permit<'a, E>,
    failure: Option<String>,
    finished: bool,
}

impl<'a, E: StatementExecutor> Transaction<'a, E> {
    pub(crate) fn start(store: &'a LocalStore<E>, mut permit: Permit<'a, E>) -> CoreResult<Self> {
        permit.begin_transaction()?;
        debug!("transaction started");
        Ok(Self {
            store,
            permit,
            failure: None,
            finished: false,
        })
    }

    /// Executes a registered write and records it in the outbox.
    ///
    /// The write and its outbox record commit or roll back together.
    pub fn set_data(&mut self, name: &str, args: &[Value]) -> CoreResult<QueryResult> {
        self.ensure_usable()?;
        let result = self.record_write(name, args);
        self.track(result)
    }

    /// Runs a registered query inside this transaction.
    pub fn get_data(&mut self, name: &str, args: &[Value]) -> CoreResult<QueryResult> {
        self.ensure_usable()?;
        let result = self
            .store
            .resolve(name)
            .and_then(|sql| self.permit.execute(&sql, args));
        self.track(result)
    }

    /// Returns true once any operation in this transaction has failed.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Commits. A failed transaction is rolled back instead.
    pub fn commit(mut self) -> CoreResult<()> {
        self.finish(true)
    }

    /// Rolls back.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.finish(false)
    }

    /// Ends the transaction: commit when `success` and nothing failed,
    /// otherwise roll back.
    pub fn end(mut self, success: bool) -> CoreResult<()> {
        self.finish(success)
    }

    fn record_write(&mut self, name: &str, args: &[Value]) -> CoreResult<QueryResult> {
        let sql = self.store.resolve(name)?;
        let arguments = outbox::encode(args)?;
        let result = self.permit.execute(&sql, args)?;
        outbox::insert(&mut *self.permit, name, &arguments)?;
        Ok(result)
    }

    pub(crate) fn execute_raw(&mut self, sql: &str) -> CoreResult<QueryResult> {
        self.ensure_usable()?;
        let result = self.permit.execute(sql, &[]);
        self.track(result)
    }

    pub(crate) fn clear_outbox(&mut self) -> CoreResult<usize> {
        self.ensure_usable()?;
        let result = outbox::clear(&mut *self.permit);
        self.track(result)
    }

    fn ensure_usable(&self) -> CoreResult<()> {
        match &self.failure {
            Some(reason) => Err(CoreError::transaction_failed(reason.clone())),
            None => Ok(()),
        }
    }

    /// Remembers the first failure.
    fn track<T>(&mut self, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(err) = &result {
            if self.failure.is_none() {
                debug!(error = %err, "transaction marked failed");
                self.failure = Some(err.to_string());
            }
        }
        result
    }

    fn finish(&mut self, success: bool) -> CoreResult<()> {
        self.finished = true;

        if success && self.failure.is_none() {
            if let Err(err) = self.permit.end_transaction(true) {
                warn!(error = %err, "commit failed, rolling back");
                if let Err(rollback_err) = self.permit.end_transaction(false) {
                    warn!(error = %rollback_err, "rollback after failed commit failed");
                }
                return Err(err);
            }
            debug!("transaction committed");
            return Ok(());
        }

        let rolled_back = self.permit.end_transaction(false);
        let Some(reason) = &self.failure else {
            rolled_back?;
            debug!("transaction rolled back");
            return Ok(());
        };

        // The failure may already have ended the executor's transaction.
        if let Err(err) = rolled_back {
            warn!(error = %err, "rollback of failed transaction reported an error");
        }
        debug!("failed transaction rolled back");
        if success {
            Err(CoreError::transaction_failed(reason.clone()))
        } else {
            Ok(())
        }
    }
}

impl<E: StatementExecutor> Drop for Transaction<'_, E> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("transaction dropped while open, rolling back");
            if let Err(err) = self.permit.end_transaction(false) {
                warn!(error = %err, "rollback of dropped transaction failed");
            }
        }
    }
}

/// The transaction a sync round runs in.
///
/// It reads and clears the outbox, reads and writes the watermark, and
/// replays remote mutations without recording them. These operations are
/// reserved for the sync engine; applications write through
/// [`Transaction::set_data`].
pub struct SyncTransaction<'a, E: StatementExecutor> {
    txn: Transaction<'a, E>,
}

impl<'a, E: StatementExecutor> SyncTransaction<'a, E> {
    pub(crate) fn new(txn: Transaction<'a, E>) -> Self {
        Self { txn }
    }

    /// Outbox records in commit order.
    pub fn pending(&mut self) -> CoreResult<Vec<OutboxRecord>> {
        self.txn.ensure_usable()?;
        let result = outbox::drain(&mut *self.txn.permit);
        self.txn.track(result)
    }

    /// The stored watermark text.
    pub fn last_sync(&mut self) -> CoreResult<Option<String>> {
        self.txn.ensure_usable()?;
        let result = outbox::read_last_sync(&mut *self.txn.permit);
        self.txn.track(result)
    }

    /// Executes a registered statement on behalf of the remote side.
    ///
    /// Nothing is added to the outbox.
    pub fn apply(&mut self, name: &str, args: &[Value]) -> CoreResult<QueryResult> {
        self.txn.ensure_usable()?;
        let result = self
            .txn
            .store
            .resolve(name)
            .and_then(|sql| self.txn.permit.execute(&sql, args));
        self.txn.track(result)
    }

    /// Overwrites the stored watermark.
    pub fn set_last_sync(&mut self, last_sync: &str) -> CoreResult<()> {
        self.txn.ensure_usable()?;
        let result = outbox::write_last_sync(&mut *self.txn.permit, last_sync);
        self.txn.track(result)
    }

    /// Deletes every outbox record.
    pub fn clear_outbox(&mut self) -> CoreResult<usize> {
        self.txn.clear_outbox()
    }

    /// Returns true once any operation in this round has failed.
    pub fn is_failed(&self) -> bool {
        self.txn.is_failed()
    }

    /// Commits the round.
    pub fn commit(self) -> CoreResult<()> {
        self.txn.commit()
    }

    /// Rolls the round back.
    pub fn rollback(self) -> CoreResult<()> {
        self.txn.rollback()
    }
}
