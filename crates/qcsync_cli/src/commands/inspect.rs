//! Inspect command implementation.

use super::{open_store, CliError, Format};
use qcsync_engine::stored_watermark;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Stored watermark, if any round has committed.
    pub last_sync: Option<String>,
    /// Watermark the next round will send.
    pub next_watermark: String,
    /// Number of outbox records.
    pub pending: usize,
    /// Outbox records (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordView>>,
}

/// One outbox record.
#[derive(Debug, Serialize)]
pub struct RecordView {
    /// Commit order.
    pub sequence: i64,
    /// Local commit time.
    pub recorded_at: String,
    /// Statement name.
    pub statement: String,
    /// Arguments, as JSON when they parse.
    pub arguments: serde_json::Value,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    show_records: bool,
    format: Format,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let store = open_store(path)?;
    let last_sync = store.last_sync()?;

    let records = if show_records {
        let records = store
            .pending()?
            .into_iter()
            .map(|record| RecordView {
                arguments: serde_json::from_str(&record.arguments)
                    .unwrap_or(serde_json::Value::String(record.arguments)),
                sequence: record.sequence,
                recorded_at: record.recorded_at,
                statement: record.statement,
            })
            .collect();
        Some(records)
    } else {
        None
    };

    let result = InspectResult {
        path: path.display().to_string(),
        next_watermark: stored_watermark(last_sync.as_deref())?.to_string(),
        last_sync,
        pending: store.pending_count()?,
        records,
    };

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        Format::Text => print_text(&result, out)?,
    }
    Ok(())
}

fn print_text(result: &InspectResult, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "Store:     {}", result.path)?;
    match &result.last_sync {
        Some(last_sync) => writeln!(out, "Last sync: {last_sync}")?,
        None => writeln!(out, "Last sync: never (sends {})", result.next_watermark)?,
    }
    writeln!(out, "Pending:   {}", result.pending)?;

    if let Some(records) = &result.records {
        for record in records {
            writeln!(
                out,
                "  #{:<6} {}  {}  {}",
                record.sequence, record.recorded_at, record.statement, record.arguments
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcsync_codec::Value;
    use qcsync_core::CoreError;
    use qcsync_engine::SyncError;
    use qcsync_testkit::{TempSqliteStore, ADD_ITEM};

    fn seeded() -> TempSqliteStore {
        let fixture = TempSqliteStore::new();
        fixture
            .store
            .set_data(ADD_ITEM, &[Value::from("apple"), Value::Integer(3)])
            .unwrap();
        fixture
    }

    #[test]
    fn text_output() {
        let fixture = seeded();
        let mut out = Vec::new();
        run(fixture.path(), true, Format::Text, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Last sync: never (sends 1970-01-01 00:00:00)"));
        assert!(text.contains("Pending:   1"));
        assert!(text.contains(r#"addItem  ["apple",3]"#));
    }

    #[test]
    fn json_output() {
        let fixture = seeded();
        let mut out = Vec::new();
        run(fixture.path(), false, Format::Json, &mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["pending"], 1);
        assert_eq!(json["last_sync"], serde_json::Value::Null);
        assert!(json.get("records").is_none());
    }

    #[test]
    fn corrupted_watermark_is_reported() {
        let fixture = seeded();
        let mut round = fixture.store.begin_sync().unwrap();
        round.set_last_sync("last tuesday").unwrap();
        round.commit().unwrap();

        let mut out = Vec::new();
        let err = run(fixture.path(), false, Format::Text, &mut out).unwrap_err();
        assert!(matches!(
            err,
            CliError::Sync(SyncError::LocalStorage(CoreError::Corrupted { .. }))
        ));
        assert!(out.is_empty());
    }
}
