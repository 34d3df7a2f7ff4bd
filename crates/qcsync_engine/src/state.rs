//! Sync coordinator state machine.

use crate::config::SyncConfig;
use crate::envelope::{outbound_envelope, stored_watermark};
use crate::error::{SyncError, SyncResult};
use crate::session::Session;
use crate::transport::SyncTransport;
use parking_lot::{Mutex, RwLock};
use qcsync_core::{LocalStore, StatementExecutor, SyncTransaction};
use qcsync_protocol::{LoginRequest, ProtocolError, SyncRequest, Watermark};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a sync round currently is.
///
/// `Idle → Authenticating → Pushing → AwaitingResponse → ApplyingRemote →
/// CommittingWatermark → Idle`, with `Aborting` reachable from every
/// middle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No round in progress.
    Idle,
    /// Logging in, if no session is active.
    Authenticating,
    /// Reading the outbox and watermark and encoding the envelope.
    Pushing,
    /// Waiting for the remote side.
    AwaitingResponse,
    /// Replaying remote mutations.
    ApplyingRemote,
    /// Storing the new watermark and clearing the outbox.
    CommittingWatermark,
    /// Rolling the round back.
    Aborting,
}

impl SyncState {
    /// Returns true while a round is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle)
    }

    /// Returns a short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Authenticating => "authenticating",
            SyncState::Pushing => "pushing",
            SyncState::AwaitingResponse => "awaiting_response",
            SyncState::ApplyingRemote => "applying_remote",
            SyncState::CommittingWatermark => "committing_watermark",
            SyncState::Aborting => "aborting",
        }
    }
}

/// Cumulative counters over the coordinator's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Rounds that committed.
    pub rounds_completed: u64,
    /// Rounds that were rolled back.
    pub rounds_failed: u64,
    /// Outbox records acknowledged by the remote side.
    pub writes_pushed: u64,
    /// Remote mutations applied locally.
    pub mutations_applied: u64,
    /// Extra attempts made by [`SyncCoordinator::sync_with_retry`].
    pub retries: u64,
    /// Rounds re-run after the remote side rejected the session.
    pub reauthentications: u64,
    /// When the last round committed.
    pub last_success: Option<Instant>,
    /// Error of the last failed round, cleared by the next success.
    pub last_error: Option<String>,
}

/// Outcome of a committed sync round.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Outbox records sent and cleared.
    pub pushed: usize,
    /// Remote mutations applied.
    pub applied: usize,
    /// Watermark stored by the round.
    pub watermark: Watermark,
    /// Wall time of the round, including any re-authentication.
    pub duration: Duration,
}

/// Callback invoked with `(from, to)` on every state change.
pub type StateObserver = Box<dyn Fn(SyncState, SyncState) + Send + Sync>;

/// Drives sync rounds between a [`LocalStore`] and a remote service.
///
/// A round runs inside one store transaction: the outbox is read and
/// encoded, the remote side answers with a watermark and mutations, the
/// mutations are replayed, the watermark is stored and the outbox cleared.
/// Any failure rolls the whole transaction back, so local state after a
/// failed round is exactly what it was before.
///
/// Rounds are serialized. Application writes wait for a round in progress
/// and vice versa, because both hold the store's permit.
pub struct SyncCoordinator<E: StatementExecutor, T: SyncTransport> {
    config: SyncConfig,
    store: Arc<LocalStore<E>>,
    transport: Arc<T>,
    state: RwLock<SyncState>,
    session: Mutex<Session>,
    stats: RwLock<SyncStats>,
    round: Mutex<()>,
    observer: Option<StateObserver>,
}

impl<E, T> SyncCoordinator<E, T>
where
    E: StatementExecutor,
    T: SyncTransport + 'static,
{
    /// Creates a coordinator for `store`.
    pub fn new(config: SyncConfig, store: Arc<LocalStore<E>>, transport: T) -> Self {
        Self {
            config,
            store,
            transport: Arc::new(transport),
            state: RwLock::new(SyncState::Idle),
            session: Mutex::new(Session::None),
            stats: RwLock::new(SyncStats::default()),
            round: Mutex::new(()),
            observer: None,
        }
    }

    /// Calls `observer` on every state change.
    ///
    /// The observer runs on the thread driving the round and must not
    /// call back into the coordinator.
    pub fn with_state_observer(
        mut self,
        observer: impl Fn(SyncState, SyncState) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore<E>> {
        &self.store
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the session state.
    pub fn session(&self) -> Session {
        *self.session.lock()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Runs one sync round.
    ///
    /// Logs in first if no session is active. If the remote side rejects
    /// the session mid-round, the round is rolled back, the coordinator
    /// logs in again and re-runs the whole round once.
    pub fn sync(&self) -> SyncResult<SyncReport> {
        let _round = self.round.lock();
        let started = Instant::now();
        let mut reauthenticated = false;

        loop {
            match self.run_round() {
                Ok(mut report) => {
                    report.duration = started.elapsed();
                    self.record_success(&report);
                    return Ok(report);
                }
                Err(SyncError::AuthenticationFailed(reason))
                    if !reauthenticated && self.session() == Session::Expired =>
                {
                    info!(%reason, "session expired, re-authenticating");
                    reauthenticated = true;
                    self.stats.write().reauthentications += 1;
                }
                Err(err) => {
                    self.record_failure(&err);
                    return Err(err);
                }
            }
        }
    }

    /// Runs [`SyncCoordinator::sync`], retrying retryable failures with
    /// the configured backoff.
    pub fn sync_with_retry(&self) -> SyncResult<SyncReport> {
        let retry = &self.config.retry;
        let attempts = retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt);
                debug!(attempt, ?delay, "waiting before retry");
                thread::sleep(delay);
                self.stats.write().retries += 1;
            }

            match self.sync() {
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    warn!(attempt, error = %err, "sync attempt failed");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Ends the session.
    ///
    /// The session is dropped even if the request fails; a failure here
    /// never affects local state.
    pub fn logout(&self) -> SyncResult<()> {
        let _round = self.round.lock();
        let previous = std::mem::take(&mut *self.session.lock());
        info!(was_active = previous.is_active(), "logging out");
        self.call(|transport, timeout| transport.logout(timeout))
    }

    fn run_round(&self) -> SyncResult<SyncReport> {
        self.set_state(SyncState::Authenticating);
        if let Err(err) = self.authenticate() {
            return Err(self.abort(None, err));
        }

        self.set_state(SyncState::Pushing);
        let mut round = match self.store.begin_sync() {
            Ok(round) => round,
            Err(err) => return Err(self.abort(None, err.into())),
        };

        let report = match self.exchange(&mut round) {
            Ok(report) => report,
            Err(err) => return Err(self.abort(Some(round), err)),
        };

        if let Err(err) = round.commit() {
            return Err(self.abort(None, err.into()));
        }
        self.set_state(SyncState::Idle);
        Ok(report)
    }

    fn authenticate(&self) -> SyncResult<()> {
        if self.session().is_active() {
            return Ok(());
        }

        let credentials = &self.config.credentials;
        info!(username = %credentials.username, "logging in");
        let request = LoginRequest::new(credentials.username.clone(), credentials.password.clone());

        let outcome = self
            .call(move |transport, timeout| transport.login(&request, timeout))
            .and_then(|response| match response.error {
                Some(reason) => Err(SyncError::AuthenticationFailed(reason)),
                None => Ok(()),
            });

        *self.session.lock() = match outcome {
            Ok(()) => Session::established(),
            Err(_) => Session::None,
        };
        outcome
    }

    /// Pushing through CommittingWatermark, inside `round`.
    fn exchange(&self, round: &mut SyncTransaction<'_, E>) -> SyncResult<SyncReport> {
        let stored = stored_watermark(round.last_sync()?.as_deref())?;
        let envelope = outbound_envelope(stored.clone(), round.pending()?)?;
        let pushed = envelope.items.len();
        let data = envelope.encode()?;
        debug!(pushed, since = %stored, "envelope encoded");

        self.set_state(SyncState::AwaitingResponse);
        let request = SyncRequest::new(data);
        let response = self
            .call(move |transport, timeout| transport.sync(&request, timeout))
            .map_err(|err| {
                if matches!(err, SyncError::AuthenticationFailed(_)) {
                    self.session.lock().expire();
                }
                err
            })?;

        if let Some(reason) = response.rejection(&self.config.success_marker) {
            return Err(SyncError::ServerSync(reason.to_string()));
        }
        let update = response
            .update
            .ok_or_else(|| ProtocolError::shape("accepted sync response has no payload"))?;

        self.set_state(SyncState::ApplyingRemote);
        for mutation in &update.mutations {
            round.apply(&mutation.statement, &mutation.arguments)?;
        }
        let applied = update.mutations.len();

        self.set_state(SyncState::CommittingWatermark);
        let watermark = if update.new_watermark < stored {
            warn!(
                received = %update.new_watermark,
                stored = %stored,
                "keeping stored watermark, received one is older"
            );
            stored
        } else {
            update.new_watermark
        };
        round.set_last_sync(watermark.as_str())?;
        let cleared = round.clear_outbox()?;
        debug!(cleared, watermark = %watermark, "watermark advanced");

        Ok(SyncReport {
            pushed,
            applied,
            watermark,
            duration: Duration::ZERO,
        })
    }

    /// Rolls `round` back and returns to idle.
    fn abort(&self, round: Option<SyncTransaction<'_, E>>, err: SyncError) -> SyncError {
        warn!(state = self.state().name(), error = %err, "sync round aborted");
        self.set_state(SyncState::Aborting);
        if let Some(round) = round {
            if let Err(rollback_err) = round.rollback() {
                warn!(error = %rollback_err, "rollback of aborted round failed");
            }
        }
        self.set_state(SyncState::Idle);
        err
    }

    /// Runs a transport call on its own thread and waits at most the
    /// configured timeout for it.
    ///
    /// A call that misses the deadline keeps running in the background
    /// until the transport gives up; its result is discarded. Transports
    /// must bound each call by the timeout they are given.
    fn call<R, F>(&self, f: F) -> SyncResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&T, Duration) -> SyncResult<R> + Send + 'static,
    {
        let timeout = self.config.timeout;
        let transport = Arc::clone(&self.transport);
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("qcsync-transport".into())
            .spawn(move || {
                // The receiver is gone if the deadline already passed.
                let _ = tx.send(f(&*transport, timeout));
            })
            .map_err(|err| SyncError::transport_fatal(format!("cannot start transport call: {err}")))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SyncError::timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(SyncError::transport_fatal("transport call panicked"))
            }
        }
    }

    fn set_state(&self, state: SyncState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = previous.name(), to = state.name(), "sync state");
            if let Some(observer) = &self.observer {
                observer(previous, state);
            }
        }
    }

    fn record_success(&self, report: &SyncReport) {
        info!(
            pushed = report.pushed,
            applied = report.applied,
            watermark = %report.watermark,
            "sync round committed"
        );
        let mut stats = self.stats.write();
        stats.rounds_completed += 1;
        stats.writes_pushed += report.pushed as u64;
        stats.mutations_applied += report.applied as u64;
        stats.last_success = Some(Instant::now());
        stats.last_error = None;
    }

    fn record_failure(&self, err: &SyncError) {
        let mut stats = self.stats.write();
        stats.rounds_failed += 1;
        stats.last_error = Some(err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, RetryConfig};
    use crate::transport::MockTransport;
    use qcsync_codec::Value;
    use qcsync_core::{CoreError, MemoryExecutor};
    use qcsync_protocol::{Command, LoginResponse, RemoteMutation, SyncEnvelope, SyncResponse};

    const ADD_ITEM: &str = "INSERT INTO t VALUES(?1)";

    type Coordinator = SyncCoordinator<MemoryExecutor, MockTransport>;

    fn setup(config: SyncConfig) -> (Coordinator, MemoryExecutor) {
        let probe = MemoryExecutor::new();
        let store = LocalStore::open(probe.clone()).unwrap();
        store.register("addItem", ADD_ITEM);
        let coordinator = SyncCoordinator::new(config, Arc::new(store), MockTransport::new());
        (coordinator, probe)
    }

    fn config() -> SyncConfig {
        SyncConfig::new("https://example.com/sync.php", Credentials::new("u", "p"))
            .with_timeout(Duration::from_secs(5))
    }

    fn at(text: &str) -> Watermark {
        Watermark::parse(text).unwrap()
    }

    fn accepted(time: &str, mutations: Vec<RemoteMutation>) -> SyncResult<SyncResponse> {
        Ok(SyncResponse::accepted(at(time), mutations))
    }

    #[test]
    fn state_names() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Aborting.is_active());
        assert_eq!(SyncState::AwaitingResponse.name(), "awaiting_response");
    }

    #[test]
    fn successful_round_applies_remote_and_clears_outbox() {
        let (sync, probe) = setup(config());
        sync.store().set_data("addItem", &[Value::from("x")]).unwrap();
        sync.transport().push_sync(accepted(
            "2024-05-01 12:00:00",
            vec![RemoteMutation::new("addItem", vec![Value::from("y")])],
        ));

        let report = sync.sync().unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(report.watermark.as_str(), "2024-05-01 12:00:00");

        assert_eq!(probe.executions_of(ADD_ITEM), 2);
        assert_eq!(probe.journal()[1].args, vec![Value::from("y")]);
        assert_eq!(sync.store().pending_count().unwrap(), 0);
        assert_eq!(probe.last_sync().as_deref(), Some("2024-05-01 12:00:00"));
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(sync.stats().rounds_completed, 1);

        let envelope = SyncEnvelope::decode(&sync.transport().envelopes()[0]).unwrap();
        assert_eq!(envelope.watermark.as_str(), Watermark::EPOCH);
        assert_eq!(envelope.items[0].key, "addItem");
        assert_eq!(envelope.items[0].values, vec![Value::from("x")]);
    }

    fn recorded(config: SyncConfig) -> (Coordinator, Arc<Mutex<Vec<SyncState>>>) {
        let (sync, _probe) = setup(config);
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&states);
        let sync = sync.with_state_observer(move |_, to| sink.lock().push(to));
        (sync, states)
    }

    #[test]
    fn round_walks_every_state() {
        let (sync, states) = recorded(config());
        sync.transport().push_sync(accepted("2024-05-01 12:00:00", vec![]));
        sync.sync().unwrap();

        assert_eq!(
            *states.lock(),
            vec![
                SyncState::Authenticating,
                SyncState::Pushing,
                SyncState::AwaitingResponse,
                SyncState::ApplyingRemote,
                SyncState::CommittingWatermark,
                SyncState::Idle,
            ]
        );
    }

    #[test]
    fn rejected_round_passes_through_aborting() {
        let (sync, states) = recorded(config());
        sync.transport()
            .push_sync(Ok(SyncResponse::rejected("database locked")));
        assert!(sync.sync().is_err());

        assert_eq!(
            *states.lock(),
            vec![
                SyncState::Authenticating,
                SyncState::Pushing,
                SyncState::AwaitingResponse,
                SyncState::Aborting,
                SyncState::Idle,
            ]
        );
    }

    #[test]
    fn refused_login_aborts_before_pushing() {
        let (sync, states) = recorded(config());
        sync.transport()
            .push_login(Ok(LoginResponse::refused("bad password")));
        assert!(sync.sync().is_err());

        assert_eq!(
            *states.lock(),
            vec![SyncState::Authenticating, SyncState::Aborting, SyncState::Idle]
        );
    }

    #[test]
    fn state_is_visible_while_waiting_for_remote() {
        let (sync, _probe) = setup(config());
        let sync = Arc::new(sync);
        sync.transport().set_delay(Duration::from_millis(300));
        sync.transport().push_sync(accepted("2024-05-01 12:00:00", vec![]));

        let worker = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.sync())
        };

        let deadline = Instant::now() + Duration::from_secs(2);
        while sync.state() != SyncState::AwaitingResponse {
            assert!(Instant::now() < deadline, "round never reached awaiting_response");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(sync.state().is_active());
        assert!(sync.store().is_busy());

        worker.join().unwrap().unwrap();
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(!sync.store().is_busy());
    }

    #[test]
    fn server_rejection_rolls_back() {
        let (sync, probe) = setup(config());
        sync.store().set_data("addItem", &[Value::from("x")]).unwrap();
        sync.transport()
            .push_sync(Ok(SyncResponse::rejected("database locked")));

        let err = sync.sync().unwrap_err();
        assert!(matches!(err, SyncError::ServerSync(ref m) if m == "database locked"));
        assert_eq!(sync.store().pending_count().unwrap(), 1);
        assert_eq!(probe.last_sync(), None);
        assert_eq!(sync.state(), SyncState::Idle);
        assert_eq!(sync.stats().rounds_failed, 1);
        assert!(!sync.store().is_busy());
    }

    #[test]
    fn success_marker_overrides_error() {
        let (sync, _probe) = setup(config());
        let mut response = SyncResponse::accepted(at("2024-05-01 12:00:00"), vec![]);
        response.error = Some("nothing to do".into());
        response.status = Some("data_success".into());
        sync.transport().push_sync(Ok(response));

        assert!(sync.sync().is_ok());
    }

    #[test]
    fn timeout_leaves_local_state_untouched() {
        let (sync, probe) = setup(config().with_timeout(Duration::from_millis(50)));
        sync.store().set_data("addItem", &[Value::from("x")]).unwrap();
        {
            let mut seed = sync.store().begin_sync().unwrap();
            seed.set_last_sync("2024-01-01 00:00:00").unwrap();
            seed.commit().unwrap();
        }
        sync.transport().set_delay(Duration::from_millis(300));
        sync.transport()
            .push_sync(accepted("2024-05-01 12:00:00", vec![]));

        let err = sync.sync().unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(sync.store().pending_count().unwrap(), 1);
        assert_eq!(probe.last_sync().as_deref(), Some("2024-01-01 00:00:00"));
        assert!(!probe.in_transaction());
    }

    #[test]
    fn unknown_remote_statement_rolls_back() {
        let (sync, probe) = setup(config());
        sync.store().set_data("addItem", &[Value::from("x")]).unwrap();
        sync.transport().push_sync(accepted(
            "2024-05-01 12:00:00",
            vec![
                RemoteMutation::new("addItem", vec![Value::from("y")]),
                RemoteMutation::new("dropEverything", vec![]),
            ],
        ));

        let err = sync.sync().unwrap_err();
        assert!(matches!(err, SyncError::UnknownStatement { ref name } if name == "dropEverything"));
        assert_eq!(probe.journal().len(), 1);
        assert_eq!(sync.store().pending_count().unwrap(), 1);
        assert_eq!(probe.last_sync(), None);
    }

    #[test]
    fn missing_payload_is_protocol_error() {
        let (sync, _probe) = setup(config());
        let mut response = SyncResponse::accepted(at("2024-05-01 12:00:00"), vec![]);
        response.update = None;
        sync.transport().push_sync(Ok(response));

        assert!(matches!(sync.sync(), Err(SyncError::Protocol(_))));
    }

    #[test]
    fn refused_login_touches_nothing() {
        let (sync, probe) = setup(config());
        sync.store().set_data("addItem", &[Value::from("x")]).unwrap();
        sync.transport()
            .push_login(Ok(LoginResponse::refused("bad password")));

        let err = sync.sync().unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationFailed(ref m) if m == "bad password"));
        assert_eq!(sync.transport().commands(), vec![Command::Login]);
        assert_eq!(sync.session(), Session::None);
        assert_eq!(sync.store().pending_count().unwrap(), 1);
        assert_eq!(probe.journal().len(), 1);
    }

    #[test]
    fn session_is_reused_across_rounds() {
        let (sync, _probe) = setup(config());
        sync.transport().push_sync(accepted("2024-05-01 12:00:00", vec![]));
        sync.transport().push_sync(accepted("2024-05-01 12:05:00", vec![]));

        sync.sync().unwrap();
        sync.sync().unwrap();
        assert_eq!(
            sync.transport().commands(),
            vec![Command::Login, Command::Sync, Command::Sync]
        );
        assert!(sync.session().is_active());
    }

    #[test]
    fn expired_session_reauthenticates_once() {
        let (sync, _probe) = setup(config());
        sync.store().set_data("addItem", &[Value::from("x")]).unwrap();
        sync.transport()
            .push_sync(Err(SyncError::AuthenticationFailed("HTTP 401".into())));
        sync.transport().push_sync(accepted("2024-05-01 12:00:00", vec![]));

        let report = sync.sync().unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(
            sync.transport().commands(),
            vec![Command::Login, Command::Sync, Command::Login, Command::Sync]
        );
        assert_eq!(sync.stats().reauthentications, 1);

        // Both attempts pushed the same write.
        let envelopes = sync.transport().envelopes();
        assert_eq!(envelopes[0], envelopes[1]);
    }

    #[test]
    fn second_session_rejection_is_surfaced() {
        let (sync, _probe) = setup(config());
        for _ in 0..2 {
            sync.transport()
                .push_sync(Err(SyncError::AuthenticationFailed("HTTP 403".into())));
        }

        assert!(matches!(sync.sync(), Err(SyncError::AuthenticationFailed(_))));
        assert_eq!(sync.transport().commands().len(), 4);
        assert_eq!(sync.session(), Session::Expired);
    }

    #[test]
    fn older_watermark_is_not_applied() {
        let (sync, probe) = setup(config());
        sync.transport().push_sync(accepted("2024-05-01 12:00:00", vec![]));
        sync.transport().push_sync(accepted("2024-04-01 00:00:00", vec![]));

        sync.sync().unwrap();
        let report = sync.sync().unwrap();
        assert_eq!(report.watermark.as_str(), "2024-05-01 12:00:00");
        assert_eq!(probe.last_sync().as_deref(), Some("2024-05-01 12:00:00"));
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let retry = RetryConfig::new(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false);
        let (sync, _probe) = setup(config().with_retry(retry));
        sync.transport()
            .push_sync(Err(SyncError::transport_retryable("connection reset")));
        sync.transport().push_sync(accepted("2024-05-01 12:00:00", vec![]));

        sync.sync_with_retry().unwrap();
        let stats = sync.stats();
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.rounds_failed, 1);
        assert_eq!(stats.rounds_completed, 1);
        assert_eq!(stats.last_error, None);
    }

    #[test]
    fn retry_gives_up_on_non_retryable() {
        let retry = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false);
        let (sync, _probe) = setup(config().with_retry(retry));
        sync.transport()
            .push_sync(Ok(SyncResponse::rejected("quota exceeded")));

        assert!(matches!(sync.sync_with_retry(), Err(SyncError::ServerSync(_))));
        assert_eq!(sync.stats().retries, 0);
    }

    #[test]
    fn logout_drops_session() {
        let (sync, _probe) = setup(config());
        sync.transport().push_sync(accepted("2024-05-01 12:00:00", vec![]));
        sync.sync().unwrap();
        sync.logout().unwrap();

        assert_eq!(sync.session(), Session::None);
        assert_eq!(sync.transport().commands().last(), Some(&Command::Logout));
    }

    #[test]
    fn sync_inside_open_transaction_fails_fast() {
        let (sync, _probe) = setup(config());
        let txn = sync.store().begin().unwrap();

        let err = sync.sync().unwrap_err();
        assert!(matches!(
            err,
            SyncError::LocalStorage(CoreError::TransactionActive)
        ));
        txn.rollback().unwrap();
        assert_eq!(sync.state(), SyncState::Idle);
    }
}
