//! Pending command implementation.

use super::{open_store, CliError};
use qcsync_engine::{outbound_envelope, stored_watermark};
use std::io::Write;
use std::path::Path;

/// Prints the `data` field the next sync round would send.
pub fn run(path: &Path, pretty: bool, out: &mut impl Write) -> Result<(), CliError> {
    let store = open_store(path)?;
    let watermark = stored_watermark(store.last_sync()?.as_deref())?;
    let envelope = outbound_envelope(watermark, store.pending()?)?;
    let text = envelope.encode().map_err(qcsync_engine::SyncError::from)?;

    if pretty {
        let value: serde_json::Value = serde_json::from_str(&text)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(out, "{text}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcsync_codec::Value;
    use qcsync_protocol::SyncEnvelope;
    use qcsync_testkit::{TempSqliteStore, ADD_ITEM, DELETE_ITEM};

    #[test]
    fn prints_decodable_envelope() {
        let fixture = TempSqliteStore::new();
        fixture
            .store
            .set_data(ADD_ITEM, &[Value::from("apple"), Value::Integer(3)])
            .unwrap();
        fixture
            .store
            .set_data(DELETE_ITEM, &[Value::from("apple")])
            .unwrap();

        let mut out = Vec::new();
        run(fixture.path(), false, &mut out).unwrap();

        let envelope = SyncEnvelope::decode(String::from_utf8(out).unwrap().trim()).unwrap();
        assert_eq!(envelope.watermark.as_str(), "1970-01-01 00:00:00");
        let keys: Vec<_> = envelope.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec![ADD_ITEM, DELETE_ITEM]);
    }

    #[test]
    fn pretty_output_is_still_json() {
        let fixture = TempSqliteStore::new();
        let mut out = Vec::new();
        run(fixture.path(), true, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[1], serde_json::json!([]));
    }
}
