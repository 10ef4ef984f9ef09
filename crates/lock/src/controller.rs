use crate::config::LockConfig;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Consecutive failed unlock attempts tolerated before the session is
/// terminated.
pub const MAX_UNLOCK_ATTEMPTS: u32 = 3;

/// Where the lock machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    /// Gating conditions not met; no timer is ever pending here.
    Unarmed,
    /// Armed and counting down; any activity restarts the countdown.
    Idle,
    /// The overlay is up; only PIN entry is accepted.
    Locked,
}

/// Outcome of a single unlock attempt. Wrong PINs are expected user error,
/// not faults, so every outcome is a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockResult {
    Unlocked,
    /// Wrong PIN below the ceiling; `attempts` is the updated count for
    /// the "Attempts: N / 3" display.
    InvalidPin { attempts: u32 },
    /// Attempt ceiling reached; the caller must terminate the session.
    ForcedLogout,
}

/// The inactivity-lock state machine.
///
/// Owns the lock phase, the failed-attempt counter and the `locked`
/// observable. It is deliberately synchronous and timer-free: the
/// [`LockService`](crate::service::LockService) drives it from its idle
/// timer, which keeps every transition testable without a clock.
#[derive(Debug)]
pub struct LockController {
    config: LockConfig,
    /// PIN gating the current lock. Lags `config.pin` while locked, so a
    /// settings write cannot dismiss or re-key an engaged overlay.
    active_pin: String,
    /// Result of the last gating evaluation (user present + config arms).
    armable: bool,
    phase: LockPhase,
    failed_attempts: u32,
    locked_tx: watch::Sender<bool>,
}

impl Default for LockController {
    fn default() -> Self {
        Self::new()
    }
}

impl LockController {
    /// Creates an unarmed controller with a disabled default config.
    #[must_use]
    pub fn new() -> Self {
        let (locked_tx, _) = watch::channel(false);
        Self {
            config: LockConfig::default(),
            active_pin: String::new(),
            armable: false,
            phase: LockPhase::Unarmed,
            failed_attempts: 0,
            locked_tx,
        }
    }

    /// Applies a configuration together with the current session status,
    /// returning the resulting phase.
    ///
    /// Arms only when a user is present, the feature is enabled and the PIN
    /// is non-empty. Disarming never force-unlocks an already-locked
    /// controller: the PIN in effect when the lock engaged keeps gating the
    /// unlock, and the new config takes over once the overlay is cleared.
    pub fn configure(&mut self, config: LockConfig, user_present: bool) -> LockPhase {
        self.armable = user_present && config.arms_lock();
        self.config = config;

        match self.phase {
            LockPhase::Locked => {
                debug!("lock config updated while locked; applying after unlock");
            }
            LockPhase::Unarmed | LockPhase::Idle => {
                if self.armable {
                    self.active_pin = self.config.pin.clone();
                    self.phase = LockPhase::Idle;
                } else {
                    self.phase = LockPhase::Unarmed;
                }
            }
        }
        self.phase
    }

    /// Engages the lock. Only meaningful from `Idle`; engaging an already
    /// locked (or unarmed) controller is a no-op, so a stale timer expiry
    /// can never re-fire the transition.
    pub fn engage_lock(&mut self) {
        if self.phase != LockPhase::Idle {
            return;
        }
        self.phase = LockPhase::Locked;
        self.failed_attempts = 0;
        self.locked_tx.send_replace(true);
        info!("screen lock engaged after inactivity");
    }

    /// Exact string comparison against the PIN gating the current lock.
    /// Pure; no counter or phase changes.
    #[must_use]
    pub fn verify_pin(&self, candidate: &str) -> bool {
        candidate == self.active_pin
    }

    /// Processes one PIN entry from the lock screen.
    ///
    /// A correct PIN clears the counter and returns the machine to `Idle`
    /// (or `Unarmed` if the gating conditions no longer hold). A wrong PIN
    /// bumps the counter; the third consecutive miss returns
    /// [`UnlockResult::ForcedLogout`], after which a fresh login restarts
    /// the machine from `Unarmed`.
    ///
    /// Calling this while not locked is a harmless no-op returning
    /// [`UnlockResult::Unlocked`].
    pub fn attempt_unlock(&mut self, candidate: &str) -> UnlockResult {
        if self.phase != LockPhase::Locked {
            return UnlockResult::Unlocked;
        }

        if self.verify_pin(candidate) {
            self.failed_attempts = 0;
            self.phase = if self.armable {
                self.active_pin = self.config.pin.clone();
                LockPhase::Idle
            } else {
                LockPhase::Unarmed
            };
            self.locked_tx.send_replace(false);
            info!("screen lock cleared");
            return UnlockResult::Unlocked;
        }

        self.failed_attempts += 1;
        if self.failed_attempts >= MAX_UNLOCK_ATTEMPTS {
            warn!(
                attempts = self.failed_attempts,
                "unlock attempt ceiling reached; forcing logout"
            );
            // The counter resets only on successful unlock or the next
            // lock engagement; the session is over either way.
            self.phase = LockPhase::Unarmed;
            self.locked_tx.send_replace(false);
            return UnlockResult::ForcedLogout;
        }

        debug!(attempts = self.failed_attempts, "invalid unlock PIN");
        UnlockResult::InvalidPin {
            attempts: self.failed_attempts,
        }
    }

    /// Returns the machine to `Unarmed` unless it is locked; a locked
    /// controller still requires the PIN (see [`Self::configure`]).
    pub fn disarm(&mut self) {
        self.armable = false;
        if self.phase != LockPhase::Locked {
            self.phase = LockPhase::Unarmed;
        }
    }

    #[must_use]
    pub const fn phase(&self) -> LockPhase {
        self.phase
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.phase == LockPhase::Locked
    }

    #[must_use]
    pub const fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    #[must_use]
    pub const fn config(&self) -> &LockConfig {
        &self.config
    }

    /// The `locked` observable the host shell renders the overlay from.
    #[must_use]
    pub fn locked_watch(&self) -> watch::Receiver<bool> {
        self.locked_tx.subscribe()
    }
}
