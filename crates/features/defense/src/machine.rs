use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use parapet_kernel::clock::Clock;
use parapet_kernel::config::{DefenseConfig, PostLockout};

use crate::error::DefenseError;

/// Observable machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenseState {
    Normal,
    ChallengeRequired,
    Locked,
}

/// A server-issued, single-use CAPTCHA challenge token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Token the solution must be submitted against.
    pub id: String,
    /// Opaque payload the UI renders (image, puzzle, etc.).
    pub data: String,
}

#[derive(Debug, Default)]
struct AttemptState {
    failure_count: u32,
    locked_until: Option<u64>,
    challenge: Option<Challenge>,
}

/// The login-defense state machine.
///
/// Created on the first login attempt in a browsing context, reset on
/// success, and never persisted across a full restart. Time is read through
/// the injected clock so lockout windows are testable without sleeping.
#[derive(Debug)]
pub struct LoginDefense {
    config: DefenseConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<AttemptState>,
}

impl LoginDefense {
    #[must_use]
    pub fn new(config: DefenseConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, inner: Mutex::new(AttemptState::default()) }
    }

    /// Current state, after applying any pending lockout expiry.
    #[must_use]
    pub fn state(&self) -> DefenseState {
        let mut inner = self.inner.lock();
        self.expire_lock(&mut inner);
        self.classify(&inner)
    }

    /// Gate to call before issuing a credential check.
    ///
    /// # Errors
    /// * [`DefenseError::LockedOut`] while the lockout window is open —
    ///   synchronous, no network contact.
    /// * [`DefenseError::ChallengeRequired`] when a challenge is mandatory
    ///   and no unused token is registered.
    pub fn authorize(&self) -> Result<(), DefenseError> {
        let mut inner = self.inner.lock();
        self.expire_lock(&mut inner);

        match self.classify(&inner) {
            DefenseState::Locked => {
                let retry_after_ms = self.remaining(&inner).unwrap_or(0);
                Err(DefenseError::LockedOut { retry_after_ms })
            },
            DefenseState::ChallengeRequired if inner.challenge.is_none() => {
                Err(DefenseError::ChallengeRequired)
            },
            _ => Ok(()),
        }
    }

    /// Registers a fresh server-issued challenge token.
    ///
    /// Replaces any previous token; each token authorizes at most one
    /// attempt.
    pub fn register_challenge(&self, challenge: Challenge) {
        debug!(id = %challenge.id, "Challenge registered");
        self.inner.lock().challenge = Some(challenge);
    }

    /// The registered, not-yet-consumed challenge, if any.
    #[must_use]
    pub fn active_challenge(&self) -> Option<Challenge> {
        self.inner.lock().challenge.clone()
    }

    /// Records a failed credential check (including a wrong challenge
    /// solution) and returns the resulting state.
    ///
    /// The active challenge token is invalidated: a fresh one must be
    /// fetched before the next attempt. Crossing the lock threshold locks
    /// the machine regardless of whether a challenge was supplied.
    pub fn record_failure(&self) -> DefenseState {
        let mut inner = self.inner.lock();
        self.expire_lock(&mut inner);

        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.challenge = None;

        if inner.failure_count >= self.config.lock_threshold {
            let until = self.clock.now_ms().saturating_add(self.config.lockout_duration_ms);
            inner.locked_until = Some(until);
            info!(
                failures = inner.failure_count,
                lockout_ms = self.config.lockout_duration_ms,
                "Login defense locked"
            );
        } else if inner.failure_count == self.config.captcha_threshold {
            debug!(failures = inner.failure_count, "Login defense now requires a challenge");
        }

        self.classify(&inner)
    }

    /// Records a successful credential check: back to `Normal`, counter
    /// cleared, lockout cleared.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.locked_until = None;
        inner.challenge = None;
        debug!("Login defense reset after success");
    }

    /// Milliseconds until the lockout expires, for UI countdowns.
    /// `None` when not locked.
    #[must_use]
    pub fn lockout_remaining_ms(&self) -> Option<u64> {
        let mut inner = self.inner.lock();
        self.expire_lock(&mut inner);
        self.remaining(&inner)
    }

    /// Consecutive failures since the last success.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    fn classify(&self, inner: &AttemptState) -> DefenseState {
        if inner.locked_until.is_some() {
            DefenseState::Locked
        } else if inner.failure_count >= self.config.captcha_threshold {
            DefenseState::ChallengeRequired
        } else {
            DefenseState::Normal
        }
    }

    fn remaining(&self, inner: &AttemptState) -> Option<u64> {
        inner.locked_until.map(|until| until.saturating_sub(self.clock.now_ms()))
    }

    /// Applies the lockout-expiry transition lazily on read.
    fn expire_lock(&self, inner: &mut AttemptState) {
        let Some(until) = inner.locked_until else { return };
        if self.clock.now_ms() < until {
            return;
        }

        inner.locked_until = None;
        match self.config.post_lockout {
            PostLockout::Normal => inner.failure_count = 0,
            PostLockout::ChallengeRequired => {
                inner.failure_count = self.config.captcha_threshold;
            },
        }
        debug!(policy = ?self.config.post_lockout, "Lockout expired");
    }
}
