//! Form-over-HTTP transport.
//!
//! Every request is a form POST to one endpoint, with the `cmd` field
//! selecting the operation. The HTTP client itself is abstracted via a
//! trait so any library (reqwest, ureq, a platform client) can carry it,
//! and so it owns cookie/session persistence.

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use parking_lot::RwLock;
use qcsync_protocol::{
    LoginRequest, LoginResponse, LogoutRequest, SyncRequest, SyncResponse,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// No response arrived before the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The connection could not be made or was lost.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// HTTP client abstraction.
///
/// Implementations must keep session cookies between calls and give up
/// on a request once `timeout` has passed.
pub trait HttpClient: Send + Sync {
    /// Posts form `fields` to `url`.
    fn post(
        &self,
        url: &str,
        fields: &[(&str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, HttpError>;
}

/// Sync transport posting form requests through an [`HttpClient`].
///
/// Only 2xx responses are decoded. A non-2xx login is an authentication
/// failure. On sync, 401 and 403 mean the session is no longer valid and
/// are reported as [`SyncError::AuthenticationFailed`]; other statuses are
/// transport errors, retryable for 5xx.
pub struct HttpTransport<C: HttpClient> {
    endpoint: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>, client: C) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The most recent failure, cleared by the next successful call.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn post(&self, fields: &[(&str, String)], timeout: Duration) -> SyncResult<HttpResponse> {
        let result = self
            .client
            .post(&self.endpoint, fields, timeout)
            .map_err(|err| match err {
                HttpError::Timeout(after) => SyncError::timeout(after),
                HttpError::Connection(message) => SyncError::transport_retryable(message),
            });

        match &result {
            Ok(response) if response.is_success() => *self.last_error.write() = None,
            Ok(response) => {
                *self.last_error.write() = Some(format!("HTTP {}", response.status));
            }
            Err(err) => *self.last_error.write() = Some(err.to_string()),
        }
        if let Ok(response) = &result {
            debug!(status = response.status, bytes = response.body.len(), "response received");
        }
        result
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn login(&self, request: &LoginRequest, timeout: Duration) -> SyncResult<LoginResponse> {
        let response = self.post(&request.form_fields(), timeout)?;
        if !response.is_success() {
            return Err(SyncError::AuthenticationFailed(format!(
                "login returned HTTP {}",
                response.status
            )));
        }
        Ok(LoginResponse::decode(&response.body)?)
    }

    fn sync(&self, request: &SyncRequest, timeout: Duration) -> SyncResult<SyncResponse> {
        let response = self.post(&request.form_fields(), timeout)?;
        match response.status {
            200..=299 => Ok(SyncResponse::decode(&response.body)?),
            401 | 403 => Err(SyncError::AuthenticationFailed(format!(
                "session rejected with HTTP {}",
                response.status
            ))),
            status @ 500..=599 => Err(SyncError::transport_retryable(format!(
                "sync returned HTTP {status}"
            ))),
            status => Err(SyncError::transport_fatal(format!(
                "sync returned HTTP {status}"
            ))),
        }
    }

    fn logout(&self, timeout: Duration) -> SyncResult<()> {
        let response = self.post(&LogoutRequest.form_fields(), timeout)?;
        if !response.is_success() {
            return Err(SyncError::transport_fatal(format!(
                "logout returned HTTP {}",
                response.status
            )));
        }
        Ok(())
    }
}

/// Trait for in-process services answering loopback requests.
pub trait LoopbackServer {
    /// Handles a form POST.
    fn handle_post(&self, fields: &[(&str, String)]) -> HttpResponse;
}

/// An HTTP client that hands requests straight to an in-process server.
///
/// Useful for testing without actual network overhead. A configured
/// latency longer than the call's timeout turns into
/// [`HttpError::Timeout`] after waiting out the timeout.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
    latency: RwLock<Duration>,
    offline: RwLock<bool>,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self {
            server,
            latency: RwLock::new(Duration::ZERO),
            offline: RwLock::new(false),
        }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }

    /// Delays every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    /// Simulates losing (or regaining) the network.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn post(
        &self,
        _url: &str,
        fields: &[(&str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, HttpError> {
        if *self.offline.read() {
            return Err(HttpError::Connection("network unreachable".into()));
        }

        let latency = *self.latency.read();
        if latency > timeout {
            std::thread::sleep(timeout);
            return Err(HttpError::Timeout(timeout));
        }
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        Ok(self.server.handle_post(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcsync_protocol::{RemoteMutation, Watermark};

    struct Canned(RwLock<HttpResponse>);

    impl LoopbackServer for Canned {
        fn handle_post(&self, _fields: &[(&str, String)]) -> HttpResponse {
            self.0.read().clone()
        }
    }

    fn transport(response: HttpResponse) -> HttpTransport<LoopbackClient<Canned>> {
        HttpTransport::new(
            "https://example.com/sync.php",
            LoopbackClient::new(Canned(RwLock::new(response))),
        )
    }

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn login_decodes_refusal() {
        let transport = transport(HttpResponse::ok(r#"[{"sync_error":"bad password"}]"#));
        let response = transport
            .login(&LoginRequest::new("u", "p"), timeout())
            .unwrap();
        assert_eq!(response.error.as_deref(), Some("bad password"));
    }

    #[test]
    fn non_2xx_login_is_authentication_failure() {
        let transport = transport(HttpResponse {
            status: 500,
            body: String::new(),
        });
        let err = transport
            .login(&LoginRequest::new("u", "p"), timeout())
            .unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationFailed(_)));
        assert_eq!(transport.last_error().as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn sync_status_gating() {
        let cases = [
            (401, "auth"),
            (403, "auth"),
            (503, "retry"),
            (404, "fatal"),
        ];
        for (status, expected) in cases {
            let transport = transport(HttpResponse {
                status,
                body: "ignored".into(),
            });
            let err = transport
                .sync(&SyncRequest::new("[]"), timeout())
                .unwrap_err();
            let kind = match err {
                SyncError::AuthenticationFailed(_) => "auth",
                SyncError::Transport { retryable: true, .. } => "retry",
                SyncError::Transport { retryable: false, .. } => "fatal",
                other => panic!("unexpected {other:?}"),
            };
            assert_eq!(kind, expected, "status {status}");
        }
    }

    #[test]
    fn sync_decodes_accepted_response() {
        let expected = SyncResponse::accepted(
            Watermark::parse("2024-05-01 12:00:00").unwrap(),
            vec![RemoteMutation::new("addItem", vec!["y".into()])],
        );
        let transport = transport(HttpResponse::ok(expected.encode().unwrap()));
        let response = transport.sync(&SyncRequest::new("[]"), timeout()).unwrap();
        assert_eq!(response, expected);
        assert_eq!(transport.last_error(), None);
    }

    #[test]
    fn malformed_body_is_protocol_error() {
        let transport = transport(HttpResponse::ok("[1, 2, 3]"));
        let err = transport
            .sync(&SyncRequest::new("[]"), timeout())
            .unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
    }

    #[test]
    fn loopback_latency_beyond_deadline_times_out() {
        let transport = transport(HttpResponse::ok("[{}]"));
        transport.client().set_latency(Duration::from_millis(200));
        let err = transport
            .sync(&SyncRequest::new("[]"), Duration::from_millis(20))
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(transport.last_error().is_some());
    }

    #[test]
    fn offline_is_retryable() {
        let transport = transport(HttpResponse::ok("[{}]"));
        transport.client().set_offline(true);
        let err = transport.logout(timeout()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn logout_non_2xx_is_transport_error() {
        let transport = transport(HttpResponse {
            status: 500,
            body: String::new(),
        });
        assert!(matches!(
            transport.logout(timeout()),
            Err(SyncError::Transport { retryable: false, .. })
        ));
    }
}
