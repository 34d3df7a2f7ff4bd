//! Remote session state.

use std::time::Instant;

/// Login state of a coordinator.
///
/// The session token itself lives in the transport (cookies); this only
/// records whether the coordinator believes it holds a valid one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Session {
    /// Never logged in, or logged out.
    #[default]
    None,
    /// Login succeeded.
    Active {
        /// When the login completed.
        established_at: Instant,
    },
    /// The remote side rejected a previously active session.
    Expired,
}

impl Session {
    /// A session established now.
    pub fn established() -> Self {
        Session::Active {
            established_at: Instant::now(),
        }
    }

    /// Returns true if requests can be sent without logging in first.
    pub fn is_active(&self) -> bool {
        matches!(self, Session::Active { .. })
    }

    /// Marks an active session as rejected by the remote side.
    pub fn expire(&mut self) {
        if self.is_active() {
            *self = Session::Expired;
        }
    }
}
