//! Outbound sync envelope.

use crate::error::{ProtocolError, ProtocolResult};
use crate::watermark::Watermark;
use qcsync_codec::{from_text, to_text, Value};

const INSERTION_TIME: &str = "insertionTime";
const KEY: &str = "key";
const SEQUENCE: &str = "sequence";
const VALUES: &str = "values";

/// One locally committed write, as presented to the remote service.
///
/// `(insertion_time, key, sequence)` identifies the write so the remote
/// side can drop a push it has already recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncItem {
    /// Local commit time of the write.
    pub insertion_time: String,
    /// Registered statement name.
    pub key: String,
    /// Local outbox sequence number.
    pub sequence: i64,
    /// Statement arguments.
    pub values: Vec<Value>,
}

impl SyncItem {
    fn to_value(&self) -> Value {
        Value::map([
            (INSERTION_TIME, Value::from(self.insertion_time.as_str())),
            (KEY, Value::from(self.key.as_str())),
            (SEQUENCE, Value::Integer(self.sequence)),
            (VALUES, Value::Array(self.values.clone())),
        ])
    }

    fn from_value(value: &Value) -> ProtocolResult<Self> {
        let text_field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_text)
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::shape(format!("sync item missing {name}")))
        };

        Ok(Self {
            insertion_time: text_field(INSERTION_TIME)?,
            key: text_field(KEY)?,
            sequence: value
                .get(SEQUENCE)
                .and_then(Value::as_integer)
                .ok_or_else(|| ProtocolError::shape("sync item missing sequence"))?,
            values: value
                .get(VALUES)
                .and_then(Value::as_array)
                .map(<[Value]>::to_vec)
                .ok_or_else(|| ProtocolError::shape("sync item missing values"))?,
        })
    }
}

/// The `data` field of a sync request: the stored watermark plus every
/// pending write in commit order.
///
/// Text form is `[lastSyncTime, [item, ...]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEnvelope {
    /// Watermark of the last successful round.
    pub watermark: Watermark,
    /// Pending writes, oldest first.
    pub items: Vec<SyncItem>,
}

impl SyncEnvelope {
    /// Creates an envelope.
    pub fn new(watermark: Watermark, items: Vec<SyncItem>) -> Self {
        Self { watermark, items }
    }

    /// Encodes to text.
    pub fn encode(&self) -> ProtocolResult<String> {
        let value = Value::Array(vec![
            Value::from(self.watermark.as_str()),
            Value::Array(self.items.iter().map(SyncItem::to_value).collect()),
        ]);
        Ok(to_text(&value)?)
    }

    /// Decodes from text.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let value = from_text(text)?;
        let parts = value
            .as_array()
            .ok_or_else(|| ProtocolError::shape("envelope must be an array"))?;

        let [watermark, items] = parts else {
            return Err(ProtocolError::shape(format!(
                "envelope must have 2 elements, found {}",
                parts.len()
            )));
        };

        let watermark = watermark
            .as_text()
            .ok_or_else(|| ProtocolError::shape("envelope watermark must be text"))
            .and_then(Watermark::parse)?;

        let items = items
            .as_array()
            .ok_or_else(|| ProtocolError::shape("envelope items must be an array"))?
            .iter()
            .map(SyncItem::from_value)
            .collect::<ProtocolResult<_>>()?;

        Ok(Self { watermark, items })
    }
}
