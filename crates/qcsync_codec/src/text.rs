//! Canonical JSON text form of [`Value`].

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde_json::{Map, Number};

/// Encodes a value to its canonical text form.
///
/// Map keys are emitted in sorted order and no insignificant whitespace
/// is produced, so equal values always encode to identical text.
pub fn to_text(value: &Value) -> CodecResult<String> {
    let json = to_json(value)?;
    serde_json::to_string(&json).map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Parses text into a value.
pub fn from_text(text: &str) -> CodecResult<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    from_json(json)
}

/// Encodes a statement argument list.
pub fn encode_arguments(args: &[Value]) -> CodecResult<String> {
    let json = args.iter().map(to_json).collect::<CodecResult<Vec<_>>>()?;
    serde_json::to_string(&json).map_err(|e| CodecError::encoding_failed(e.to_string()))
}

/// Decodes a statement argument list previously produced by [`encode_arguments`].
///
/// The text must hold an array; `null` is accepted as an empty list.
pub fn decode_arguments(text: &str) -> CodecResult<Vec<Value>> {
    match from_text(text)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(CodecError::decoding_failed(format!(
            "expected argument array, found {}",
            other.kind()
        ))),
    }
}

fn to_json(value: &Value) -> CodecResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::Number(Number::from(*n)),
        Value::Float(f) => {
            serde_json::Value::Number(Number::from_f64(*f).ok_or(CodecError::NonFiniteFloat)?)
        }
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<CodecResult<_>>()?)
        }
        Value::Map(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                map.insert(key.clone(), to_json(item)?);
            }
            serde_json::Value::Object(map)
        }
    })
}

fn from_json(json: serde_json::Value) -> CodecResult<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if n.is_u64() {
                return Err(CodecError::IntegerOutOfRange {
                    literal: n.to_string(),
                });
            } else {
                Value::Float(n.as_f64().ok_or(CodecError::NonFiniteFloat)?)
            }
        }
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(from_json).collect::<CodecResult<_>>()?)
        }
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| from_json(v).map(|v| (k, v)))
                .collect::<CodecResult<_>>()?,
        ),
    })
}
