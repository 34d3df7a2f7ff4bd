//! Protocol messages for login, sync and logout.

use crate::error::{ProtocolError, ProtocolResult};
use crate::watermark::Watermark;
use qcsync_codec::{from_text, to_text, Value};
use std::collections::BTreeMap;

const SYNC_ERROR: &str = "sync_error";
const SYNC_RESPONSE: &str = "sync_response";
const SYNC_TIME: &str = "sync_time";
const SYNC_DATA: &str = "sync_data";
const KEY: &str = "key";
const SYNC_INFO: &str = "syncInfo";

/// Form fields of a request, in the order they are sent.
pub type FormFields = Vec<(&'static str, String)>;

/// The `cmd` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Establish a session.
    Login,
    /// Push the outbox and pull remote changes.
    Sync,
    /// End the session.
    Logout,
}

impl Command {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Login => "login",
            Command::Sync => "sync",
            Command::Logout => "logout",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "login" => Some(Command::Login),
            "sync" => Some(Command::Sync),
            "logout" => Some(Command::Logout),
            _ => None,
        }
    }
}

/// Login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Remote user name.
    pub username: String,
    /// Remote password.
    pub password: String,
}

impl LoginRequest {
    /// Creates a login request.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the form fields to post.
    pub fn form_fields(&self) -> FormFields {
        vec![
            ("cmd", Command::Login.as_str().to_string()),
            ("uname", self.username.clone()),
            ("pword", self.password.clone()),
        ]
    }
}

/// Sync request carrying an encoded [`crate::SyncEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Encoded envelope text.
    pub data: String,
}

impl SyncRequest {
    /// Creates a sync request.
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Returns the form fields to post.
    pub fn form_fields(&self) -> FormFields {
        vec![
            ("cmd", Command::Sync.as_str().to_string()),
            ("data", self.data.clone()),
        ]
    }
}

/// Logout request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogoutRequest;

impl LogoutRequest {
    /// Returns the form fields to post.
    pub fn form_fields(&self) -> FormFields {
        vec![("cmd", Command::Logout.as_str().to_string())]
    }
}

/// Login response: `[ {sync_error?} ]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    /// Error reported by the remote service, if the login was refused.
    pub error: Option<String>,
}

impl LoginResponse {
    /// Creates a successful login response.
    pub fn success() -> Self {
        Self { error: None }
    }

    /// Creates a refused login response.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    /// Returns true if the login was accepted.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Encodes to text.
    pub fn encode(&self) -> ProtocolResult<String> {
        let mut status = BTreeMap::new();
        if let Some(error) = &self.error {
            status.insert(SYNC_ERROR.to_string(), Value::from(error.as_str()));
        }
        Ok(to_text(&Value::Array(vec![Value::Map(status)]))?)
    }

    /// Decodes from text.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let value = from_text(text)?;
        let parts = top_level(&value, 1..=1)?;
        let status = expect_map(&parts[0], "login status")?;
        Ok(Self {
            error: optional_text(status, SYNC_ERROR)?,
        })
    }
}

/// A statement the remote side asks the local store to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMutation {
    /// Registered statement name.
    pub statement: String,
    /// Statement arguments (scalars only).
    pub arguments: Vec<Value>,
}

impl RemoteMutation {
    /// Creates a remote mutation.
    pub fn new(statement: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self {
            statement: statement.into(),
            arguments,
        }
    }

    fn to_value(&self) -> Value {
        Value::map([
            (KEY, Value::from(self.statement.as_str())),
            (SYNC_INFO, Value::Array(self.arguments.clone())),
        ])
    }

    fn from_value(value: &Value) -> ProtocolResult<Self> {
        let map = expect_map(value, "sync_data entry")?;
        let statement = map
            .get(KEY)
            .and_then(Value::as_text)
            .ok_or_else(|| ProtocolError::shape("sync_data entry missing key"))?
            .to_string();
        let arguments = map
            .get(SYNC_INFO)
            .and_then(Value::as_array)
            .ok_or_else(|| ProtocolError::shape("sync_data entry missing syncInfo"))?;

        if let Some(nested) = arguments.iter().find(|v| !v.is_scalar()) {
            return Err(ProtocolError::shape(format!(
                "syncInfo for {statement} contains a nested {}",
                nested.kind()
            )));
        }

        Ok(Self {
            statement,
            arguments: arguments.to_vec(),
        })
    }
}

/// The remote side of an accepted sync round.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUpdate {
    /// Watermark to store once every mutation has been applied.
    pub new_watermark: Watermark,
    /// Mutations to apply, in order.
    pub mutations: Vec<RemoteMutation>,
}

/// Sync response:
/// `[ {sync_error?, sync_response?}, {sync_time, sync_data: [{key, syncInfo}]} ]`.
///
/// The second element may be absent when the remote side reports an error.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResponse {
    /// `sync_error`, if present.
    pub error: Option<String>,
    /// `sync_response`, if present.
    pub status: Option<String>,
    /// Watermark and mutations, if present.
    pub update: Option<RemoteUpdate>,
}

impl SyncResponse {
    /// Creates an accepted response.
    pub fn accepted(new_watermark: Watermark, mutations: Vec<RemoteMutation>) -> Self {
        Self {
            error: None,
            status: None,
            update: Some(RemoteUpdate {
                new_watermark,
                mutations,
            }),
        }
    }

    /// Creates a rejected response without a payload.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            status: None,
            update: None,
        }
    }

    /// Returns the remote error if this response rejects the round.
    ///
    /// A `sync_error` is ignored when `sync_response` equals `success_marker`.
    pub fn rejection(&self, success_marker: &str) -> Option<&str> {
        match (&self.error, &self.status) {
            (Some(_), Some(status)) if status == success_marker => None,
            (Some(error), _) => Some(error),
            (None, _) => None,
        }
    }

    /// Encodes to text.
    pub fn encode(&self) -> ProtocolResult<String> {
        let mut status = BTreeMap::new();
        if let Some(error) = &self.error {
            status.insert(SYNC_ERROR.to_string(), Value::from(error.as_str()));
        }
        if let Some(response) = &self.status {
            status.insert(SYNC_RESPONSE.to_string(), Value::from(response.as_str()));
        }

        let mut parts = vec![Value::Map(status)];
        if let Some(update) = &self.update {
            parts.push(Value::map([
                (SYNC_TIME, Value::from(update.new_watermark.as_str())),
                (
                    SYNC_DATA,
                    Value::Array(update.mutations.iter().map(RemoteMutation::to_value).collect()),
                ),
            ]));
        }
        Ok(to_text(&Value::Array(parts))?)
    }

    /// Decodes from text, validating the full shape.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let value = from_text(text)?;
        let parts = top_level(&value, 1..=2)?;

        let status = expect_map(&parts[0], "sync status")?;
        let error = optional_text(status, SYNC_ERROR)?;
        let response = optional_text(status, SYNC_RESPONSE)?;

        let update = match parts.get(1) {
            Some(payload) => Some(decode_update(payload)?),
            None => None,
        };

        Ok(Self {
            error,
            status: response,
            update,
        })
    }
}

fn decode_update(value: &Value) -> ProtocolResult<RemoteUpdate> {
    let payload = expect_map(value, "sync payload")?;

    let new_watermark = payload
        .get(SYNC_TIME)
        .and_then(Value::as_text)
        .ok_or_else(|| ProtocolError::shape("sync payload missing sync_time"))
        .and_then(Watermark::parse)?;

    let mutations = payload
        .get(SYNC_DATA)
        .and_then(Value::as_array)
        .ok_or_else(|| ProtocolError::shape("sync payload missing sync_data"))?
        .iter()
        .map(RemoteMutation::from_value)
        .collect::<ProtocolResult<_>>()?;

    Ok(RemoteUpdate {
        new_watermark,
        mutations,
    })
}

fn top_level(value: &Value, arity: std::ops::RangeInclusive<usize>) -> ProtocolResult<&[Value]> {
    let parts = value
        .as_array()
        .ok_or_else(|| ProtocolError::shape(format!("expected array, found {}", value.kind())))?;
    if !arity.contains(&parts.len()) {
        return Err(ProtocolError::shape(format!(
            "expected {}..={} elements, found {}",
            arity.start(),
            arity.end(),
            parts.len()
        )));
    }
    Ok(parts)
}

fn expect_map<'a>(value: &'a Value, what: &str) -> ProtocolResult<&'a BTreeMap<String, Value>> {
    value
        .as_map()
        .ok_or_else(|| ProtocolError::shape(format!("{what} must be a map, found {}", value.kind())))
}

// Absent and null are both "not set"; anything else must be text.
fn optional_text(map: &BTreeMap<String, Value>, key: &str) -> ProtocolResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ProtocolError::shape(format!(
            "{key} must be text, found {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_form_fields() {
        let fields = LoginRequest::new("ann", "secret").form_fields();
        assert_eq!(
            fields,
            vec![
                ("cmd", "login".to_string()),
                ("uname", "ann".to_string()),
                ("pword", "secret".to_string()),
            ]
        );
        assert_eq!(LogoutRequest.form_fields(), vec![("cmd", "logout".to_string())]);
        assert_eq!(SyncRequest::new("[]").form_fields()[1], ("data", "[]".to_string()));
    }

    #[test]
    fn command_names() {
        for cmd in [Command::Login, Command::Sync, Command::Logout] {
            assert_eq!(Command::parse(cmd.as_str()), Some(cmd));
        }
        assert_eq!(Command::parse("drop"), None);
    }

    #[test]
    fn login_response_decoding() {
        assert!(LoginResponse::decode("[{}]").unwrap().is_success());
        let refused = LoginResponse::decode(r#"[{"sync_error":"bad password"}]"#).unwrap();
        assert_eq!(refused.error.as_deref(), Some("bad password"));
        assert!(LoginResponse::decode("[]").is_err());
        assert!(LoginResponse::decode("[{}, {}]").is_err());
        assert!(LoginResponse::decode(r#"{"sync_error":"x"}"#).is_err());
    }

    #[test]
    fn sync_response_decoding() {
        let text = r#"[{},{"sync_time":"2024-05-01 12:00:00","sync_data":[{"key":"addItem","syncInfo":["y",2]}]}]"#;
        let response = SyncResponse::decode(text).unwrap();
        assert_eq!(response.rejection("data_success"), None);

        let update = response.update.unwrap();
        assert_eq!(update.new_watermark.as_str(), "2024-05-01 12:00:00");
        assert_eq!(
            update.mutations,
            vec![RemoteMutation::new("addItem", vec![Value::from("y"), Value::Integer(2)])]
        );
    }

    #[test]
    fn success_marker_overrides_error() {
        let text = r#"[{"sync_error":"none","sync_response":"data_success"},{"sync_time":"2024-05-01 12:00:00","sync_data":[]}]"#;
        let response = SyncResponse::decode(text).unwrap();
        assert_eq!(response.rejection("data_success"), None);
        assert_eq!(response.rejection("ok"), Some("none"));
    }

    #[test]
    fn rejection_without_payload() {
        let response = SyncResponse::decode(r#"[{"sync_error":"quota exceeded"}]"#).unwrap();
        assert_eq!(response.rejection("data_success"), Some("quota exceeded"));
        assert!(response.update.is_none());
    }

    #[test]
    fn strict_shape() {
        // missing sync_time
        assert!(SyncResponse::decode(r#"[{},{"sync_data":[]}]"#).is_err());
        // missing sync_data
        assert!(SyncResponse::decode(r#"[{},{"sync_time":"2024-05-01 12:00:00"}]"#).is_err());
        // too many elements
        assert!(SyncResponse::decode("[{},{},{}]").is_err());
        // status not a map
        assert!(SyncResponse::decode(r#"["ok"]"#).is_err());
        // sync_error not text
        assert!(SyncResponse::decode(r#"[{"sync_error":5}]"#).is_err());
        // nested argument
        let nested = r#"[{},{"sync_time":"2024-05-01 12:00:00","sync_data":[{"key":"k","syncInfo":[[1]]}]}]"#;
        assert!(SyncResponse::decode(nested).is_err());
        // bad timestamp
        let bad_time = r#"[{},{"sync_time":"soon","sync_data":[]}]"#;
        assert!(matches!(
            SyncResponse::decode(bad_time),
            Err(ProtocolError::InvalidWatermark { .. })
        ));
    }

    #[test]
    fn encode_matches_decode() {
        let response = SyncResponse::accepted(
            Watermark::parse("2024-05-01 12:00:00").unwrap(),
            vec![RemoteMutation::new("addItem", vec![Value::from("z")])],
        );
        let decoded = SyncResponse::decode(&response.encode().unwrap()).unwrap();
        assert_eq!(decoded, response);

        let refused = LoginResponse::refused("nope");
        assert_eq!(LoginResponse::decode(&refused.encode().unwrap()).unwrap(), refused);
    }
}
