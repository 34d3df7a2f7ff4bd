//! SQLite statement executor.

use crate::error::{CoreError, CoreResult};
use crate::executor::{QueryResult, StatementExecutor};
use qcsync_codec::{to_text, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;

/// A statement executor backed by a SQLite connection.
///
/// Booleans bind as 0/1; arrays and maps bind as their canonical text.
/// Blobs read back as arrays of byte values.
///
/// SQLite ends the open transaction by itself on some failures (`OR
/// ROLLBACK` conflicts, a full disk, I/O errors). Such a failure is
/// reported with a note that the transaction is gone, and the rollback
/// that follows is a no-op.
pub struct SqliteExecutor {
    conn: Connection,
    in_transaction: bool,
}

impl SqliteExecutor {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn bind(value: &Value) -> CoreResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(n) => SqlValue::Integer(*n),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Map(_) => SqlValue::Text(to_text(value)?),
    })
}

fn read(value: ValueRef<'_>) -> CoreResult<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Integer(n),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| CoreError::storage(format!("text column is not UTF-8: {e}")))?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::Integer(i64::from(*b))).collect()),
    })
}

impl SqliteExecutor {
    fn run(&mut self, sql: &str, args: &[Value]) -> CoreResult<QueryResult> {
        let params = args.iter().map(bind).collect::<CoreResult<Vec<_>>>()?;
        let mut stmt = self.conn.prepare(sql)?;

        let column_count = stmt.column_count();
        if column_count == 0 {
            let changed = stmt.execute(params_from_iter(params))?;
            return Ok(QueryResult::affected(changed));
        }

        let columns = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| read(row.get_ref(i)?))
                .collect::<CoreResult<Vec<_>>>()?;
            out.push(values);
        }
        Ok(QueryResult::with_rows(columns, out))
    }
}

impl StatementExecutor for SqliteExecutor {
    fn execute(&mut self, sql: &str, args: &[Value]) -> CoreResult<QueryResult> {
        let result = self.run(sql, args);
        match result {
            Err(err) if self.in_transaction && self.conn.is_autocommit() => {
                self.in_transaction = false;
                Err(CoreError::storage(format!(
                    "{err} (sqlite ended the transaction)"
                )))
            }
            other => other,
        }
    }

    fn begin_transaction(&mut self) -> CoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    fn end_transaction(&mut self, commit: bool) -> CoreResult<()> {
        self.in_transaction = false;
        if !commit && self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn
            .execute_batch(if commit { "COMMIT" } else { "ROLLBACK" })?;
        Ok(())
    }
}
