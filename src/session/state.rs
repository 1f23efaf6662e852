use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Idle time after which a signed-in console locks itself.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque bearer credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    SignedOut,
    Active,
    Locked,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub phase: SessionPhase,
    pub authenticated: bool,
    pub locked: bool,
    pub idle_ms: u64,
}

/// Session lifecycle.
///
/// `locked` and a present token never coexist: every path that sets the lock
/// clears the token and a login clears the lock. Time is passed in so the
/// transitions can be driven from tests.
#[derive(Debug, Clone)]
pub struct SessionState {
    token: Option<SessionToken>,
    last_activity: Instant,
    locked: bool,
    password_input: String,
}

impl SessionState {
    pub fn new(now: Instant) -> Self {
        Self {
            token: None,
            last_activity: now,
            locked: false,
            password_input: String::new(),
        }
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn password_input(&self) -> &str {
        &self.password_input
    }

    pub fn set_password_input(&mut self, value: impl Into<String>) {
        self.password_input = value.into();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    pub fn on_login_success(&mut self, token: SessionToken, now: Instant) {
        self.token = Some(token);
        self.password_input.clear();
        self.locked = false;
        self.last_activity = now;
    }

    /// Resets the idle clock. Returns `true` when this dismissed the lock.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        self.last_activity = now;
        if self.locked {
            self.locked = false;
            return true;
        }
        false
    }

    /// Explicit lock. Returns `true` when anything changed.
    pub fn lock(&mut self) -> bool {
        let changed = self.token.is_some() || !self.locked;
        self.token = None;
        self.password_input.clear();
        self.locked = true;
        changed
    }

    /// Explicit sign-out; leaves the lock flag alone.
    pub fn logout(&mut self) -> bool {
        self.password_input.clear();
        self.token.take().is_some()
    }

    /// Soft sign-out after a 401. Returns `true` when a token was dropped.
    pub fn invalidate(&mut self) -> bool {
        self.token.take().is_some()
    }

    /// Auto-lock check. Returns `true` on the ACTIVE -> LOCKED transition.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        if self.token.is_none() {
            return false;
        }
        if self.idle_for(now) > LOCK_TIMEOUT {
            self.token = None;
            self.password_input.clear();
            self.locked = true;
            return true;
        }
        false
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.token, self.locked) {
            (Some(_), _) => SessionPhase::Active,
            (None, true) => SessionPhase::Locked,
            (None, false) => SessionPhase::SignedOut,
        }
    }

    pub fn view(&self, now: Instant) -> SessionView {
        SessionView {
            phase: self.phase(),
            authenticated: self.token.is_some(),
            locked: self.locked,
            idle_ms: self.idle_for(now).as_millis() as u64,
        }
    }
}
