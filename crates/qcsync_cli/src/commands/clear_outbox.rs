//! Clear-outbox command implementation.

use super::{open_store, CliError};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Deletes every outbox record. Non-empty outboxes need `yes`.
pub fn run(path: &Path, yes: bool, out: &mut impl Write) -> Result<(), CliError> {
    let store = open_store(path)?;
    let pending = store.pending_count()?;
    if pending > 0 && !yes {
        return Err(CliError::Refused(format!(
            "{pending} pending writes would be lost; pass --yes to clear them"
        )));
    }

    let removed = store.clear_outbox()?;
    if removed > 0 {
        warn!(removed, "outbox cleared, writes will not reach the server");
    }
    writeln!(out, "Removed {removed} pending writes")?;
    Ok(())
}
