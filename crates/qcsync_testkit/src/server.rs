//! A scriptable fake of the remote sync service.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use qcsync_protocol::{
    Command, LoginResponse, RemoteMutation, SyncEnvelope, SyncItem, SyncResponse, Watermark,
};
use std::collections::{HashSet, VecDeque};

/// Identifies one pushed write across retried rounds.
pub type ItemKey = (String, String, i64);

#[derive(Debug)]
struct ServerState {
    username: String,
    password: String,
    logged_in: bool,
    clock: NaiveDateTime,
    received: Vec<SyncItem>,
    seen: HashSet<ItemKey>,
    outgoing: Vec<RemoteMutation>,
    reject_next: Option<String>,
    lose_next_response: bool,
    statuses: VecDeque<u16>,
    commands: Vec<Command>,
}

/// An in-process stand-in for the remote sync service.
///
/// It speaks the form protocol: `cmd=login` checks credentials and opens a
/// session, `cmd=sync` requires the session, records pushed writes
/// (dropping ones already recorded, keyed by insertion time, statement and
/// sequence), answers with queued mutations and advances its clock by one
/// minute, `cmd=logout` closes the session.
///
/// Responses are `(status, body)` pairs so any HTTP shim can wrap it.
#[derive(Debug)]
pub struct FakeSyncServer {
    state: Mutex<ServerState>,
}

impl FakeSyncServer {
    /// Clock value before the first accepted round.
    pub const START: &'static str = "2024-01-01 00:00:00";

    /// Creates a server accepting one account.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        let clock = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self {
            state: Mutex::new(ServerState {
                username: username.into(),
                password: password.into(),
                logged_in: false,
                clock,
                received: Vec::new(),
                seen: HashSet::new(),
                outgoing: Vec::new(),
                reject_next: None,
                lose_next_response: false,
                statuses: VecDeque::new(),
                commands: Vec::new(),
            }),
        }
    }

    /// Queues a mutation for the next accepted round.
    pub fn queue_mutation(&self, mutation: RemoteMutation) {
        self.state.lock().outgoing.push(mutation);
    }

    /// Makes the next sync answer with `sync_error`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.state.lock().reject_next = Some(reason.into());
    }

    /// Processes the next sync normally but answers 504, as if the
    /// response was lost on the way back.
    pub fn lose_next_response(&self) {
        self.state.lock().lose_next_response = true;
    }

    /// Answers the next request with `status` and an empty body, without
    /// processing it.
    pub fn fail_next_with_status(&self, status: u16) {
        self.state.lock().statuses.push_back(status);
    }

    /// Forgets the current session, so the next sync gets a 401.
    pub fn expire_session(&self) {
        self.state.lock().logged_in = false;
    }

    /// Returns true while a session is open.
    pub fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }

    /// Writes recorded so far, in arrival order.
    pub fn received(&self) -> Vec<SyncItem> {
        self.state.lock().received.clone()
    }

    /// Commands received so far, including failed ones.
    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().commands.clone()
    }

    /// The `sync_time` of the last accepted round, or [`Self::START`].
    pub fn clock(&self) -> String {
        format_clock(self.state.lock().clock)
    }

    /// Handles one form POST.
    pub fn handle_post(&self, fields: &[(&str, String)]) -> (u16, String) {
        let field = |name: &str| {
            fields
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
        };

        let mut state = self.state.lock();
        let Some(command) = field("cmd").and_then(Command::parse) else {
            return (400, String::new());
        };
        state.commands.push(command);

        if let Some(status) = state.statuses.pop_front() {
            return (status, String::new());
        }

        match command {
            Command::Login => {
                let accepted =
                    field("uname") == Some(state.username.as_str()) && field("pword") == Some(state.password.as_str());
                state.logged_in = accepted;
                let response = if accepted {
                    LoginResponse::success()
                } else {
                    LoginResponse::refused("invalid credentials")
                };
                encoded(response.encode())
            }
            Command::Sync => {
                if !state.logged_in {
                    return (401, String::new());
                }
                let Some(data) = field("data") else {
                    return encoded(SyncResponse::rejected("missing data").encode());
                };
                state.sync(data)
            }
            Command::Logout => {
                state.logged_in = false;
                encoded(LoginResponse::success().encode())
            }
        }
    }
}

impl ServerState {
    fn sync(&mut self, data: &str) -> (u16, String) {
        let envelope = match SyncEnvelope::decode(data) {
            Ok(envelope) => envelope,
            Err(err) => return encoded(SyncResponse::rejected(format!("malformed data: {err}")).encode()),
        };
        if let Some(reason) = self.reject_next.take() {
            return encoded(SyncResponse::rejected(reason).encode());
        }

        for item in envelope.items {
            let key = (item.insertion_time.clone(), item.key.clone(), item.sequence);
            if self.seen.insert(key) {
                self.received.push(item);
            }
        }

        self.clock += Duration::minutes(1);
        let mutations = std::mem::take(&mut self.outgoing);
        let response = Watermark::parse(&format_clock(self.clock))
            .map(|watermark| SyncResponse::accepted(watermark, mutations));

        if std::mem::take(&mut self.lose_next_response) {
            return (504, String::new());
        }
        match response {
            Ok(response) => encoded(response.encode()),
            Err(err) => (500, err.to_string()),
        }
    }
}

fn format_clock(clock: NaiveDateTime) -> String {
    clock.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn encoded<E: std::fmt::Display>(body: Result<String, E>) -> (u16, String) {
    match body {
        Ok(body) => (200, body),
        Err(err) => (500, err.to_string()),
    }
}
