//! Building the outbound envelope from local state.

use crate::error::{SyncError, SyncResult};
use qcsync_core::{CoreError, OutboxRecord};
use qcsync_protocol::{SyncEnvelope, SyncItem, Watermark};

/// Parses the stored watermark text, defaulting to the epoch.
///
/// Unparseable stored text is local corruption, not a protocol failure.
pub fn stored_watermark(text: Option<&str>) -> SyncResult<Watermark> {
    match text {
        Some(text) => Watermark::parse(text)
            .map_err(|err| SyncError::LocalStorage(CoreError::corrupted(err.to_string()))),
        None => Ok(Watermark::epoch()),
    }
}

/// The envelope pushing `records` since `watermark`, in record order.
pub fn outbound_envelope(
    watermark: Watermark,
    records: Vec<OutboxRecord>,
) -> SyncResult<SyncEnvelope> {
    let items = records
        .into_iter()
        .map(|record| -> SyncResult<SyncItem> {
            let values = record.decode_arguments()?;
            Ok(SyncItem {
                insertion_time: record.recorded_at,
                key: record.statement,
                sequence: record.sequence,
                values,
            })
        })
        .collect::<SyncResult<Vec<_>>>()?;
    Ok(SyncEnvelope::new(watermark, items))
}
