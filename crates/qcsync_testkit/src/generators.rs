//! Property-based test generators using proptest.

use proptest::prelude::*;
use qcsync_codec::Value;
use qcsync_protocol::{RemoteMutation, Watermark};

/// Scalar values that survive the text codec unchanged.
///
/// Floats are quarter steps so every one has an exact decimal form.
pub fn scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1_000_000i32..1_000_000).prop_map(|n| Value::Float(f64::from(n) / 4.0)),
        "[a-zA-Z0-9 _'\"\\\\]{0,24}".prop_map(Value::Text),
    ]
}

/// Argument lists for a statement.
pub fn arguments() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(scalar_value(), 0..6)
}

/// Statement names.
pub fn statement_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,15}").expect("Invalid regex")
}

/// Watermark texts between 2000 and 2099, second precision.
pub fn watermark_text() -> impl Strategy<Value = String> {
    (2000u32..2100, 1u32..13, 1u32..29, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, mo, d, h, mi, s)| format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}"),
    )
}

/// Parsed watermarks, see [`watermark_text`].
pub fn watermark() -> impl Strategy<Value = Watermark> {
    watermark_text().prop_map(|text| Watermark::parse(&text).expect("Generated watermark must parse"))
}

/// Remote mutations naming one of `statements`.
pub fn remote_mutation(statements: &'static [&'static str]) -> impl Strategy<Value = RemoteMutation> {
    (prop::sample::select(statements), arguments())
        .prop_map(|(name, args)| RemoteMutation::new(name, args))
}
