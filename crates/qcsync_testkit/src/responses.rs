//! Canned wire responses.

use qcsync_protocol::{LoginResponse, RemoteMutation, SyncResponse, Watermark};

/// Body of a successful login.
pub fn login_ok() -> String {
    encode_login(LoginResponse::success())
}

/// Body of a refused login.
pub fn login_refused(reason: &str) -> String {
    encode_login(LoginResponse::refused(reason))
}

/// Body of an accepted sync round.
///
/// # Panics
///
/// Panics if `sync_time` is not a valid watermark.
pub fn sync_accepted(sync_time: &str, mutations: Vec<RemoteMutation>) -> String {
    let watermark = Watermark::parse(sync_time).expect("Invalid sync_time");
    SyncResponse::accepted(watermark, mutations)
        .encode()
        .expect("Failed to encode sync response")
}

/// Body of a rejected sync round.
pub fn sync_rejected(reason: &str) -> String {
    SyncResponse::rejected(reason)
        .encode()
        .expect("Failed to encode sync response")
}

/// Body carrying both `sync_error` and the success marker, which counts as
/// accepted.
pub fn sync_error_with_marker(reason: &str, marker: &str, sync_time: &str) -> String {
    let mut response = SyncResponse::accepted(
        Watermark::parse(sync_time).expect("Invalid sync_time"),
        Vec::new(),
    );
    response.error = Some(reason.to_string());
    response.status = Some(marker.to_string());
    response.encode().expect("Failed to encode sync response")
}

/// Sync bodies that must fail decoding, each with a description.
pub const MALFORMED_SYNC_RESPONSES: &[(&str, &str)] = &[
    ("not json", "<html>502 Bad Gateway</html>"),
    ("object at top level", r#"{"sync_error":"x"}"#),
    ("empty list", "[]"),
    ("three elements", r#"[{}, {"sync_time":"2024-01-01 00:00:00","sync_data":[]}, {}]"#),
    ("status not a map", r#"["ok"]"#),
    ("missing sync_time", r#"[{}, {"sync_data":[]}]"#),
    ("missing sync_data", r#"[{}, {"sync_time":"2024-01-01 00:00:00"}]"#),
    ("bad sync_time", r#"[{}, {"sync_time":"yesterday","sync_data":[]}]"#),
    ("entry missing key", r#"[{}, {"sync_time":"2024-01-01 00:00:00","sync_data":[{"syncInfo":[]}]}]"#),
    ("entry missing syncInfo", r#"[{}, {"sync_time":"2024-01-01 00:00:00","sync_data":[{"key":"addItem"}]}]"#),
    ("nested argument", r#"[{}, {"sync_time":"2024-01-01 00:00:00","sync_data":[{"key":"addItem","syncInfo":[["x"]]}]}]"#),
    ("sync_error not text", r#"[{"sync_error":42}]"#),
];

fn encode_login(response: LoginResponse) -> String {
    response.encode().expect("Failed to encode login response")
}
