//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use qcsync_protocol::{Command, LoginRequest, LoginResponse, SyncRequest, SyncResponse};
use std::collections::VecDeque;
use std::time::Duration;

/// Carries login, sync and logout requests to the remote service.
///
/// Implementations keep whatever session state (cookies, tokens) the
/// remote service hands out between calls.
///
/// # Timeouts
///
/// `timeout` is the deadline for one call, and implementations must
/// return within it. The coordinator runs each call on its own thread
/// and stops waiting at the deadline, but it cannot cancel the call: a
/// transport that ignores `timeout` leaves one blocked thread behind per
/// missed deadline.
pub trait SyncTransport: Send + Sync {
    /// Sends a login request.
    fn login(&self, request: &LoginRequest, timeout: Duration) -> SyncResult<LoginResponse>;

    /// Sends the encoded envelope and returns the decoded response.
    fn sync(&self, request: &SyncRequest, timeout: Duration) -> SyncResult<SyncResponse>;

    /// Ends the session.
    fn logout(&self, timeout: Duration) -> SyncResult<()>;
}

/// A scripted transport for testing.
///
/// Responses are consumed in the order they were queued. With nothing
/// queued, logins succeed and syncs fail with a fatal transport error.
#[derive(Debug, Default)]
pub struct MockTransport {
    logins: Mutex<VecDeque<SyncResult<LoginResponse>>>,
    syncs: Mutex<VecDeque<SyncResult<SyncResponse>>>,
    delay: Mutex<Duration>,
    commands: Mutex<Vec<Command>>,
    envelopes: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of the next unanswered login.
    pub fn push_login(&self, result: SyncResult<LoginResponse>) {
        self.logins.lock().push_back(result);
    }

    /// Queues the result of the next unanswered sync.
    pub fn push_sync(&self, result: SyncResult<SyncResponse>) {
        self.syncs.lock().push_back(result);
    }

    /// Makes every sync call sleep for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Commands received so far.
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    /// `data` fields of every sync request received so far.
    pub fn envelopes(&self) -> Vec<String> {
        self.envelopes.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn login(&self, _request: &LoginRequest, _timeout: Duration) -> SyncResult<LoginResponse> {
        self.commands.lock().push(Command::Login);
        self.logins
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(LoginResponse::success()))
    }

    fn sync(&self, request: &SyncRequest, _timeout: Duration) -> SyncResult<SyncResponse> {
        self.commands.lock().push(Command::Sync);
        self.envelopes.lock().push(request.data.clone());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.syncs
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_fatal("no scripted sync response")))
    }

    fn logout(&self, _timeout: Duration) -> SyncResult<()> {
        self.commands.lock().push(Command::Logout);
        Ok(())
    }
}
