//! In-memory statement executor.

use crate::error::{CoreError, CoreResult};
use crate::executor::{QueryResult, StatementExecutor};
use crate::schema;
use parking_lot::Mutex;
use qcsync_codec::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An application statement the executor has applied.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// Transaction the statement ran in, `None` in autocommit mode.
    pub transaction: Option<u64>,
    /// Statement text.
    pub sql: String,
    /// Bound arguments.
    pub args: Vec<Value>,
}

/// Something the executor was asked to do.
///
/// Unlike the journal, the trace is never rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A transaction began.
    Begin(u64),
    /// A statement was executed, successfully or not.
    Execute {
        /// Transaction the statement ran in.
        transaction: Option<u64>,
        /// Statement text.
        sql: String,
    },
    /// A transaction committed.
    Commit(u64),
    /// A transaction rolled back.
    Rollback(u64),
}

#[derive(Debug, Clone, Default)]
struct Tables {
    outbox: Vec<(i64, String, String, String)>,
    next_seq: i64,
    last_sync: Option<Value>,
    journal: Vec<JournalEntry>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    snapshot: Option<Tables>,
    current: Option<u64>,
    transactions: u64,
    failures: Vec<String>,
    fail_next_commit: bool,
    stubs: HashMap<String, QueryResult>,
    trace: Vec<TraceEvent>,
}

/// A statement executor that keeps everything in memory.
///
/// The sync tables are interpreted; every other statement is appended to
/// a journal, or answered from a stubbed result. Clones share state, so
/// a test keeps one clone as a probe after handing another to the store.
///
/// Useful for:
/// - Unit tests of the store and the sync engine
/// - Injecting executor failures
///
/// # Example
///
/// ```
/// use qcsync_core::{MemoryExecutor, StatementExecutor};
/// use qcsync_codec::Value;
///
/// let mut executor = MemoryExecutor::new();
/// executor.execute("INSERT INTO t VALUES(?1)", &[Value::from("x")]).unwrap();
/// assert_eq!(executor.journal().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryExecutor {
    /// Creates an empty executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every statement containing `pattern` fail.
    pub fn fail_on(&self, pattern: impl Into<String>) {
        self.state.lock().failures.push(pattern.into());
    }

    /// Removes every failure injected with [`MemoryExecutor::fail_on`].
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Makes the next commit fail. The transaction stays open.
    pub fn fail_next_commit(&self) {
        self.state.lock().fail_next_commit = true;
    }

    /// Answers `sql` with `result` instead of journaling it.
    pub fn stub_query(&self, sql: impl Into<String>, result: QueryResult) {
        self.state.lock().stubs.insert(sql.into(), result);
    }

    /// Applied application statements.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.lock().tables.journal.clone()
    }

    /// Everything the executor was asked to do.
    pub fn trace(&self) -> Vec<TraceEvent> {
        self.state.lock().trace.clone()
    }

    /// Number of outbox records currently stored.
    pub fn outbox_len(&self) -> usize {
        self.state.lock().tables.outbox.len()
    }

    /// The stored watermark.
    pub fn last_sync(&self) -> Option<String> {
        match &self.state.lock().tables.last_sync {
            Some(Value::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// How many times `sql` was executed, including failed attempts.
    pub fn executions_of(&self, sql: &str) -> usize {
        self.state
            .lock()
            .trace
            .iter()
            .filter(|event| matches!(event, TraceEvent::Execute { sql: s, .. } if s == sql))
            .count()
    }
}

impl MemoryState {
    fn run(&mut self, sql: &str, args: &[Value]) -> CoreResult<QueryResult> {
        if let Some(pattern) = self.failures.iter().find(|p| sql.contains(p.as_str())) {
            return Err(CoreError::storage(format!("injected failure on '{pattern}'")));
        }

        let tables = &mut self.tables;
        match sql {
            schema::CREATE_SYNC_INFO | schema::CREATE_SYNC_VALUES => Ok(QueryResult::default()),
            schema::INSERT_RECORD => {
                let [recorded_at, statement, arguments] = args else {
                    return Err(CoreError::storage("outbox insert expects 3 arguments"));
                };
                let text = |value: &Value| {
                    value
                        .as_text()
                        .map(str::to_string)
                        .ok_or_else(|| CoreError::storage("outbox columns are text"))
                };
                tables.next_seq += 1;
                let record = (
                    tables.next_seq,
                    text(recorded_at)?,
                    text(statement)?,
                    text(arguments)?,
                );
                tables.outbox.push(record);
                Ok(QueryResult::affected(1))
            }
            schema::SELECT_RECORDS => Ok(QueryResult::with_rows(
                ["seq", "recorded_at", "sql_key", "sql_params"]
                    .map(String::from)
                    .to_vec(),
                tables
                    .outbox
                    .iter()
                    .map(|(seq, at, key, params)| {
                        vec![
                            Value::Integer(*seq),
                            Value::from(at.as_str()),
                            Value::from(key.as_str()),
                            Value::from(params.as_str()),
                        ]
                    })
                    .collect(),
            )),
            schema::COUNT_RECORDS => Ok(QueryResult::with_rows(
                vec!["COUNT(*)".to_string()],
                vec![vec![Value::Integer(tables.outbox.len() as i64)]],
            )),
            schema::DELETE_RECORDS => {
                let removed = tables.outbox.len();
                tables.outbox.clear();
                Ok(QueryResult::affected(removed))
            }
            schema::SELECT_LAST_SYNC => Ok(QueryResult::with_rows(
                vec!["last_sync".to_string()],
                tables.last_sync.iter().map(|v| vec![v.clone()]).collect(),
            )),
            schema::UPSERT_LAST_SYNC => {
                let [last_sync] = args else {
                    return Err(CoreError::storage("watermark upsert expects 1 argument"));
                };
                tables.last_sync = Some(last_sync.clone());
                Ok(QueryResult::affected(1))
            }
            _ => {
                if let Some(stub) = self.stubs.get(sql) {
                    return Ok(stub.clone());
                }
                tables.journal.push(JournalEntry {
                    transaction: self.current,
                    sql: sql.to_string(),
                    args: args.to_vec(),
                });
                Ok(QueryResult::affected(1))
            }
        }
    }
}

impl StatementExecutor for MemoryExecutor {
    fn execute(&mut self, sql: &str, args: &[Value]) -> CoreResult<QueryResult> {
        let mut state = self.state.lock();
        let transaction = state.current;
        state.trace.push(TraceEvent::Execute {
            transaction,
            sql: sql.to_string(),
        });
        state.run(sql, args)
    }

    fn begin_transaction(&mut self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.current.is_some() {
            return Err(CoreError::storage(
                "cannot start a transaction within a transaction",
            ));
        }
        state.transactions += 1;
        let id = state.transactions;
        state.current = Some(id);
        state.snapshot = Some(state.tables.clone());
        state.trace.push(TraceEvent::Begin(id));
        Ok(())
    }

    fn end_transaction(&mut self, commit: bool) -> CoreResult<()> {
        let mut state = self.state.lock();
        let Some(id) = state.current else {
            return Err(CoreError::storage("no transaction is active"));
        };

        if commit {
            if std::mem::take(&mut state.fail_next_commit) {
                return Err(CoreError::storage("injected commit failure"));
            }
            state.snapshot = None;
            state.trace.push(TraceEvent::Commit(id));
        } else {
            if let Some(snapshot) = state.snapshot.take() {
                state.tables = snapshot;
            }
            state.trace.push(TraceEvent::Rollback(id));
        }
        state.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_tables() {
        let mut exec = MemoryExecutor::new();
        exec.execute(schema::UPSERT_LAST_SYNC, &[Value::from("a")]).unwrap();

        exec.begin_transaction().unwrap();
        exec.execute(schema::UPSERT_LAST_SYNC, &[Value::from("b")]).unwrap();
        exec.execute("INSERT INTO t VALUES(1)", &[]).unwrap();
        exec.end_transaction(false).unwrap();

        assert_eq!(exec.last_sync().as_deref(), Some("a"));
        assert!(exec.journal().is_empty());
        assert_eq!(
            exec.trace().last(),
            Some(&TraceEvent::Rollback(1))
        );
    }

    #[test]
    fn nested_begin_is_rejected() {
        let mut exec = MemoryExecutor::new();
        exec.begin_transaction().unwrap();
        assert!(exec.begin_transaction().is_err());
        exec.end_transaction(true).unwrap();
        assert!(exec.end_transaction(true).is_err());
    }

    #[test]
    fn sequence_survives_delete() {
        let mut exec = MemoryExecutor::new();
        let args = [Value::from("t"), Value::from("k"), Value::from("[]")];
        exec.execute(schema::INSERT_RECORD, &args).unwrap();
        exec.execute(schema::DELETE_RECORDS, &[]).unwrap();
        exec.execute(schema::INSERT_RECORD, &args).unwrap();

        let rows = exec.execute(schema::SELECT_RECORDS, &[]).unwrap().rows;
        assert_eq!(rows[0][0], Value::Integer(2));
    }

    #[test]
    fn failed_commit_keeps_transaction_open() {
        let mut exec = MemoryExecutor::new();
        exec.fail_next_commit();
        exec.begin_transaction().unwrap();
        assert!(exec.end_transaction(true).is_err());
        assert!(exec.in_transaction());
        exec.end_transaction(false).unwrap();
        assert!(!exec.in_transaction());
    }

    #[test]
    fn injected_failures_are_counted_in_trace() {
        let mut exec = MemoryExecutor::new();
        exec.fail_on("DELETE");
        assert!(exec.execute("DELETE FROM t", &[]).is_err());
        assert_eq!(exec.executions_of("DELETE FROM t"), 1);
        exec.clear_failures();
        assert!(exec.execute("DELETE FROM t", &[]).is_ok());
    }
}
