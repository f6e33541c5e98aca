//! Refresh configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ConfigError, VellumError, VellumResult};

/// Default bound on a single coordination-store fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between watch polls.
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the refresh coordinator and its background watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Upper bound for one fetch from the coordination store. Applies to the
    /// shared flight, so every coalesced waiter sees the same timeout.
    pub fetch_timeout: Duration,
    /// Whether the background watch polls the store for newer versions.
    pub watch_enabled: bool,
    /// Interval between watch polls.
    pub watch_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            watch_enabled: false,
            watch_interval: DEFAULT_WATCH_INTERVAL,
        }
    }
}

impl RefreshConfig {
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_watch(mut self, interval: Duration) -> Self {
        self.watch_enabled = true;
        self.watch_interval = interval;
        self
    }

    pub fn without_watch(mut self) -> Self {
        self.watch_enabled = false;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - fetch_timeout is positive
    /// - watch_interval is positive when the watch is enabled
    pub fn validate(&self) -> VellumResult<()> {
        if self.fetch_timeout.is_zero() {
            return Err(VellumError::Config(ConfigError::InvalidValue {
                field: "fetch_timeout".to_string(),
                value: format!("{:?}", self.fetch_timeout),
                reason: "fetch_timeout must be positive".to_string(),
            }));
        }

        if self.watch_enabled && self.watch_interval.is_zero() {
            return Err(VellumError::Config(ConfigError::InvalidValue {
                field: "watch_interval".to_string(),
                value: format!("{:?}", self.watch_interval),
                reason: "watch_interval must be positive when the watch is enabled".to_string(),
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RefreshConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.watch_enabled);
        assert_eq!(config.fetch_timeout, DEFAULT_FETCH_TIMEOUT);
    }

    #[test]
    fn test_zero_fetch_timeout_rejected() {
        let config = RefreshConfig::default().with_fetch_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(VellumError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "fetch_timeout"
        ));
    }

    #[test]
    fn test_zero_watch_interval_only_matters_when_enabled() {
        let enabled = RefreshConfig::default().with_watch(Duration::ZERO);
        assert!(enabled.validate().is_err());

        let disabled = enabled.without_watch();
        assert!(disabled.validate().is_ok());
    }
}
