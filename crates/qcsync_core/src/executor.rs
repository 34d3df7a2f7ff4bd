//! Statement executor seam.

use crate::error::CoreResult;
use qcsync_codec::Value;

/// Rows and counters returned by a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names, empty for statements that return no rows.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a write statement.
    pub rows_affected: usize,
}

impl QueryResult {
    /// A result for a write that changed `rows_affected` rows.
    pub fn affected(rows_affected: usize) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    /// A result holding rows.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: 0,
        }
    }

    /// Returns the first column of the first row.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// The relational engine the local store runs on.
///
/// Executors are **opaque statement runners**: they execute SQL text with
/// positional arguments and provide a single, non-nested transaction.
/// The store owns all sequencing, so implementors never need their own
/// locking.
///
/// # Implementors
///
/// - [`crate::MemoryExecutor`] - For testing
/// - `SqliteExecutor` - SQLite via rusqlite (feature `sqlite`)
pub trait StatementExecutor: Send {
    /// Executes `sql` with `args` bound to its placeholders.
    fn execute(&mut self, sql: &str, args: &[Value]) -> CoreResult<QueryResult>;

    /// Starts a transaction.
    fn begin_transaction(&mut self) -> CoreResult<()>;

    /// Commits (`commit == true`) or rolls back the open transaction.
    fn end_transaction(&mut self, commit: bool) -> CoreResult<()>;
}

impl<E: StatementExecutor + ?Sized> StatementExecutor for Box<E> {
    fn execute(&mut self, sql: &str, args: &[Value]) -> CoreResult<QueryResult> {
        (**self).execute(sql, args)
    }

    fn begin_transaction(&mut self) -> CoreResult<()> {
        (**self).begin_transaction()
    }

    fn end_transaction(&mut self, commit: bool) -> CoreResult<()> {
        (**self).end_transaction(commit)
    }
}
