//! Mutation outbox and watermark persistence.
//!
//! Every function here runs on an executor the caller has already put
//! inside a transaction (or, for reads, holds exclusively). None of them
//! opens a transaction of its own.

use crate::error::{CoreError, CoreResult};
use crate::executor::StatementExecutor;
use crate::schema;
use qcsync_codec::{decode_arguments, encode_arguments, Value};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A locally committed write waiting to be replayed remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRecord {
    /// Commit order.
    pub sequence: i64,
    /// UTC time the write was recorded.
    pub recorded_at: String,
    /// Registered statement name.
    pub statement: String,
    /// Arguments in canonical text form.
    pub arguments: String,
}

impl OutboxRecord {
    /// Decodes the stored arguments.
    pub fn decode_arguments(&self) -> CoreResult<Vec<Value>> {
        Ok(decode_arguments(&self.arguments)?)
    }

    fn from_row(row: &[Value]) -> CoreResult<Self> {
        let [sequence, recorded_at, statement, arguments] = row else {
            return Err(CoreError::corrupted(format!(
                "sync_values row has {} columns",
                row.len()
            )));
        };
        let text = |value: &Value, column: &str| {
            value
                .as_text()
                .map(str::to_string)
                .ok_or_else(|| CoreError::corrupted(format!("sync_values.{column} is not text")))
        };

        Ok(Self {
            sequence: sequence
                .as_integer()
                .ok_or_else(|| CoreError::corrupted("sync_values.seq is not an integer"))?,
            recorded_at: text(recorded_at, "recorded_at")?,
            statement: text(statement, "sql_key")?,
            arguments: text(arguments, "sql_params")?,
        })
    }
}

/// Serializes arguments the way [`insert`] stores them.
pub(crate) fn encode(args: &[Value]) -> CoreResult<String> {
    Ok(encode_arguments(args)?)
}

/// Appends a record for `statement` with pre-encoded arguments.
pub(crate) fn insert<E: StatementExecutor + ?Sized>(
    executor: &mut E,
    statement: &str,
    arguments: &str,
) -> CoreResult<()> {
    let recorded_at = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();
    executor.execute(
        schema::INSERT_RECORD,
        &[
            Value::Text(recorded_at),
            Value::from(statement),
            Value::from(arguments),
        ],
    )?;
    Ok(())
}

/// Reads every record in commit order.
pub(crate) fn drain<E: StatementExecutor + ?Sized>(executor: &mut E) -> CoreResult<Vec<OutboxRecord>> {
    executor
        .execute(schema::SELECT_RECORDS, &[])?
        .rows
        .iter()
        .map(|row| OutboxRecord::from_row(row))
        .collect()
}

/// Counts records.
pub(crate) fn count<E: StatementExecutor + ?Sized>(executor: &mut E) -> CoreResult<usize> {
    let result = executor.execute(schema::COUNT_RECORDS, &[])?;
    result
        .scalar()
        .and_then(Value::as_integer)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CoreError::corrupted("record count is not a non-negative integer"))
}

/// Deletes every record.
pub(crate) fn clear<E: StatementExecutor + ?Sized>(executor: &mut E) -> CoreResult<usize> {
    Ok(executor.execute(schema::DELETE_RECORDS, &[])?.rows_affected)
}

/// Reads the stored watermark text, if any.
pub(crate) fn read_last_sync<E: StatementExecutor + ?Sized>(
    executor: &mut E,
) -> CoreResult<Option<String>> {
    let result = executor.execute(schema::SELECT_LAST_SYNC, &[])?;
    match result.scalar() {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(text)) => Ok(Some(text.clone())),
        Some(other) => Err(CoreError::corrupted(format!(
            "sync_info.last_sync is {}",
            other.kind()
        ))),
    }
}

/// Overwrites the stored watermark.
pub(crate) fn write_last_sync<E: StatementExecutor + ?Sized>(
    executor: &mut E,
    last_sync: &str,
) -> CoreResult<()> {
    executor.execute(schema::UPSERT_LAST_SYNC, &[Value::from(last_sync)])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(seq: i64) -> Vec<Value> {
        vec![
            Value::Integer(seq),
            Value::from("2024-01-01 00:00:00.000000"),
            Value::from("addItem"),
            Value::from(r#"["x"]"#),
        ]
    }

    #[test]
    fn record_from_row() {
        let record = OutboxRecord::from_row(&row(4)).unwrap();
        assert_eq!(record.sequence, 4);
        assert_eq!(record.statement, "addItem");
        assert_eq!(record.decode_arguments().unwrap(), vec![Value::from("x")]);
    }

    #[test]
    fn malformed_rows_are_corruption() {
        assert!(matches!(
            OutboxRecord::from_row(&row(1)[..3]),
            Err(CoreError::Corrupted { .. })
        ));

        let mut bad = row(1);
        bad[0] = Value::from("one");
        assert!(matches!(
            OutboxRecord::from_row(&bad),
            Err(CoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn encoding_rejects_nan() {
        assert!(matches!(
            encode(&[Value::Float(f64::NAN)]),
            Err(CoreError::Codec(_))
        ));
    }
}
