//! Playback orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::admission::UserId;

/// Upper bound accepted for `cooldown_secs` (30 days).
pub const MAX_COOLDOWN_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound accepted for `retry_backoff_ms` (1 hour).
pub const MAX_RETRY_BACKOFF_MS: u64 = 60 * 60 * 1000;

/// Configuration for the playback orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Identity allowed to skip and stop, exempt from the cooldown.
    pub privileged_user_id: UserId,

    /// Minimum time between two accepted advances from one identity (seconds).
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Delay before retrying a failed automatic advance (milliseconds).
    /// Retries continue at this interval until one succeeds or an explicit
    /// command arrives.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Start relaying as soon as the service is up, without waiting for a command.
    #[serde(default)]
    pub autostart: bool,
}

fn default_cooldown() -> u64 {
    900 // 15 minutes
}

fn default_retry_backoff() -> u64 {
    60_000 // 1 minute
}

impl PlaybackConfig {
    pub fn new(privileged_user_id: UserId) -> Self {
        Self {
            privileged_user_id,
            cooldown_secs: default_cooldown(),
            retry_backoff_ms: default_retry_backoff(),
            autostart: false,
        }
    }

    pub fn with_retry_backoff_ms(mut self, retry_backoff_ms: u64) -> Self {
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    pub fn with_cooldown_secs(mut self, cooldown_secs: u64) -> Self {
        self.cooldown_secs = cooldown_secs;
        self
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Cooldown window, saturating instead of overflowing.
    pub fn cooldown(&self) -> chrono::Duration {
        i64::try_from(self.cooldown_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: PlaybackConfig = toml::from_str("privileged_user_id = 42").unwrap();
        assert_eq!(config.privileged_user_id, UserId(42));
        assert_eq!(config.cooldown_secs, 900);
        assert_eq!(config.retry_backoff_ms, 60_000);
        assert!(!config.autostart);
    }

    #[test]
    fn test_cooldown_saturates() {
        let config = PlaybackConfig::new(UserId(1)).with_cooldown_secs(u64::MAX);
        assert_eq!(config.cooldown(), chrono::Duration::MAX);

        let config = PlaybackConfig::new(UserId(1)).with_cooldown_secs(90);
        assert_eq!(config.cooldown(), chrono::Duration::seconds(90));
    }

    #[test]
    fn test_missing_privileged_user_fails() {
        let result: Result<PlaybackConfig, _> = toml::from_str("cooldown_secs = 10");
        assert!(result.is_err());
    }
}
