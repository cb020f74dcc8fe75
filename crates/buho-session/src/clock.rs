//! Session timing: configuration, lifecycle states, and expiry rules.
//!
//! A session has two independent deadlines:
//!
//! - **Lifetime**: measured from login. Activity doesn't extend it.
//! - **Inactivity**: measured from the last qualifying interaction.
//!
//! Whichever passes first ends the session.

use std::sync::Arc;
use std::time::Duration;

use buho_protocol::Clock;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum time after login before the session is force-expired.
    ///
    /// Default: 2 hours.
    pub session_lifetime: Duration,

    /// Maximum gap between interactions before the session is torn down.
    ///
    /// Default: 30 minutes.
    pub inactivity_limit: Duration,

    /// How often the background watch re-checks the session.
    ///
    /// Default: 60 seconds.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_lifetime: Duration::from_secs(2 * 60 * 60),
            inactivity_limit: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Reads overrides from the environment:
    ///
    /// - `BUHO_SESSION_LIFETIME_SECS`
    /// - `BUHO_INACTIVITY_LIMIT_SECS`
    /// - `BUHO_POLL_INTERVAL_SECS`
    ///
    /// Unset variables keep their default. Unparsable ones are logged and
    /// also keep their default. The result is [`validated`](Self::validated).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            session_lifetime: env_secs(
                "BUHO_SESSION_LIFETIME_SECS",
                defaults.session_lifetime,
            ),
            inactivity_limit: env_secs(
                "BUHO_INACTIVITY_LIMIT_SECS",
                defaults.inactivity_limit,
            ),
            poll_interval: env_secs(
                "BUHO_POLL_INTERVAL_SECS",
                defaults.poll_interval,
            ),
        }
        .validated()
    }

    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// - Zero durations become 1 ms (a zero interval would spin the watch,
    ///   and a zero lifetime would expire every session at login).
    /// - `poll_interval` is capped to `inactivity_limit`, so an idle
    ///   session is never noticed more than one limit late.
    pub fn validated(mut self) -> Self {
        let floor = Duration::from_millis(1);
        self.session_lifetime = self.session_lifetime.max(floor);
        self.inactivity_limit = self.inactivity_limit.max(floor);
        self.poll_interval = self.poll_interval.max(floor);
        if self.poll_interval > self.inactivity_limit {
            tracing::warn!(
                poll_ms = self.poll_interval.as_millis() as u64,
                limit_ms = self.inactivity_limit.as_millis() as u64,
                "poll interval exceeds inactivity limit, clamping"
            );
            self.poll_interval = self.inactivity_limit;
        }
        self
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!(%name, value = %raw, "ignoring unparsable duration");
                default
            }
        },
        Err(_) => default,
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Where a stored session is in its lifecycle.
///
/// ```text
///   NoSession ──(login)──→ Active ──(lifetime elapsed)──→ Expired ──┐
///       ↑                    │                                      │
///       │                    └──(inactivity limit)──→ Inactive ─────┤
///       └─────────────────────(teardown / logout)───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Nothing stored, or what's stored is incomplete.
    NoSession,
    /// Logged in, within both deadlines.
    Active,
    /// The session lifetime has elapsed since login.
    Expired,
    /// No interaction within the inactivity limit.
    Inactive,
}

/// The two persisted timestamps, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub login_at: u64,
    pub last_activity_at: u64,
}

// ---------------------------------------------------------------------------
// SessionClock
// ---------------------------------------------------------------------------

/// Applies [`SessionConfig`] deadlines to stored timestamps.
///
/// Holds no session state itself; the timestamps live in client storage
/// and are passed in.
#[derive(Clone)]
pub struct SessionClock {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionClock {
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current time in epoch milliseconds.
    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// `true` once `now - login_at >= session_lifetime`.
    pub fn is_expired(&self, login_at: u64, now: u64) -> bool {
        elapsed(login_at, now) >= self.config.session_lifetime
    }

    /// `true` once `now - last_activity_at >= inactivity_limit`.
    pub fn is_inactive(&self, last_activity_at: u64, now: u64) -> bool {
        elapsed(last_activity_at, now) >= self.config.inactivity_limit
    }

    /// Classifies stored timestamps at the current time. Expiry is checked
    /// before inactivity.
    pub fn evaluate(&self, timestamps: Option<Timestamps>) -> SessionStatus {
        let Some(ts) = timestamps else {
            return SessionStatus::NoSession;
        };
        let now = self.now();
        if self.is_expired(ts.login_at, now) {
            SessionStatus::Expired
        } else if self.is_inactive(ts.last_activity_at, now) {
            SessionStatus::Inactive
        } else {
            SessionStatus::Active
        }
    }

    /// Lifetime left for a session that started at `login_at`.
    pub fn remaining(&self, login_at: u64) -> Duration {
        self.config
            .session_lifetime
            .saturating_sub(elapsed(login_at, self.now()))
    }
}

/// Time from `since` to `now`. A timestamp in the future (clock stepped
/// backwards) counts as zero elapsed.
fn elapsed(since: u64, now: u64) -> Duration {
    Duration::from_millis(now.saturating_sub(since))
}
