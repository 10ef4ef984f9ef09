use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Screen-lock configuration as persisted by the settings collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Enable/disable the inactivity lock
    pub enabled: bool,

    /// Numeric unlock PIN; must be non-empty for the lock to arm.
    /// Length is advisory only (the settings UI asks for 4+ digits),
    /// the controller only requires non-empty.
    pub pin: String,

    /// Minutes of inactivity before the lock engages
    pub timeout_minutes: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pin: String::new(),
            timeout_minutes: 5,
        }
    }
}

impl LockConfig {
    /// Whether this configuration is sufficient to arm the lock at all.
    ///
    /// A disabled feature, an empty PIN, or a zero timeout all leave the
    /// subsystem inert; none of them is an error.
    #[must_use]
    pub fn arms_lock(&self) -> bool {
        self.enabled && !self.pin.is_empty() && self.timeout_minutes > 0
    }

    /// The configured idle window as a [`Duration`].
    ///
    /// Saturates for absurd minute counts; the settings file is external
    /// input and must not be able to panic the host shell.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }
}
