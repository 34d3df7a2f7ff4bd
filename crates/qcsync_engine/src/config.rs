//! Configuration for the sync coordinator.

use std::time::Duration;

/// `sync_response` value that overrides a `sync_error` sent alongside it.
pub const DEFAULT_SUCCESS_MARKER: &str = "data_success";

/// Login credentials for the remote service.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Account name, sent as `uname`.
    pub username: String,
    /// Password, sent as `pword`.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for sync rounds.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// URL every form request is posted to.
    pub endpoint: String,
    /// Login credentials.
    pub credentials: Credentials,
    /// Deadline for each remote call.
    pub timeout: Duration,
    /// Retry configuration for [`crate::SyncCoordinator::sync_with_retry`].
    pub retry: RetryConfig,
    /// See [`DEFAULT_SUCCESS_MARKER`].
    pub success_marker: String,
}

impl SyncConfig {
    /// Creates a configuration for `endpoint` with default timeouts.
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            success_marker: DEFAULT_SUCCESS_MARKER.to_string(),
        }
    }

    /// Sets the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the success marker.
    pub fn with_success_marker(mut self, marker: impl Into<String>) -> Self {
        self.success_marker = marker.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("", Credentials::default())
    }
}

/// Backoff between attempts of [`crate::SyncCoordinator::sync_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay, jitter included.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays. Values below 1.0 act as 1.0.
    pub backoff_multiplier: f64,
    /// Adds up to 25% random extra delay.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a configuration with `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier. Values below 1.0 (and NaN) become 1.0.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Delay to wait before attempt `attempt` (0-indexed; attempt 0 never waits).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let multiplier = self.backoff_multiplier.max(1.0);
        let secs = (self.initial_delay.as_secs_f64() * multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());

        let factor = if self.add_jitter {
            1.0 + 0.25 * jitter()
        } else {
            1.0
        };
        Duration::try_from_secs_f64(secs * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Fraction in `[0, 1)` taken from the clock's sub-second nanos.
fn jitter() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    f64::from(nanos % 1024) / 1024.0
}
