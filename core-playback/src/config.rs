//! # Manager Configuration
//!
//! Tunables for the media source manager: how far around the cursor sources
//! are resolved, how long queue edits are coalesced before a load pass, and
//! how long resolved sources stay valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Media source manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Number of items resolved on each side of the current index.
    ///
    /// A window of 1 keeps the current item plus one neighbour on each side
    /// ready, i.e. three slots.
    ///
    /// Default: 1.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Quiet period after non-critical queue edits before a load pass runs.
    ///
    /// Default: 400 ms.
    #[serde(default = "default_load_debounce")]
    pub load_debounce: Duration,

    /// How long a loaded source may be played before it must be resolved
    /// again. Stream URLs handed out by services are usually signed and
    /// expire.
    ///
    /// Default: 2 hours.
    #[serde(default = "default_source_expiration")]
    pub source_expiration: Duration,

    /// Delay after which a failed slot may be resolved again.
    ///
    /// Default: 0 (a failed slot is eligible on the next load pass).
    #[serde(default = "default_failed_retry_delay")]
    pub failed_retry_delay: Duration,

    /// Whether slots that failed because the stream itself is unplayable
    /// (extraction error, no playable source) are ever resolved again for
    /// the same item.
    ///
    /// Default: true.
    #[serde(default = "default_retry_source_errors")]
    pub retry_source_errors: bool,

    /// Whether the right-hand side of the window wraps around to the start
    /// of the queue when it runs past the end.
    ///
    /// Default: true.
    #[serde(default = "default_wrap_window")]
    pub wrap_window: bool,

    /// Number of in-flight loads above which a load pass that does not
    /// already cover the current item aborts every outstanding loader.
    ///
    /// Default: `None`, meaning `2 * window_size + 1`.
    #[serde(default)]
    pub max_concurrent_loaders: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            load_debounce: default_load_debounce(),
            source_expiration: default_source_expiration(),
            failed_retry_delay: default_failed_retry_delay(),
            retry_source_errors: default_retry_source_errors(),
            wrap_window: default_wrap_window(),
            max_concurrent_loaders: None,
        }
    }
}

impl ManagerConfig {
    /// Create a configuration that keeps more of the queue ready.
    ///
    /// - Two neighbours on each side
    /// - Short debounce (200 ms)
    pub fn aggressive_prefetch() -> Self {
        Self {
            window_size: 2,
            load_debounce: Duration::from_millis(200),
            ..Default::default()
        }
    }

    /// Create a configuration that resolves as little as possible.
    ///
    /// - One neighbour on each side
    /// - Long debounce (800 ms) so bursts of edits cost a single pass
    pub fn conservative() -> Self {
        Self {
            window_size: 1,
            load_debounce: Duration::from_millis(800),
            ..Default::default()
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_load_debounce(mut self, period: Duration) -> Self {
        self.load_debounce = period;
        self
    }

    pub fn with_source_expiration(mut self, expiration: Duration) -> Self {
        self.source_expiration = expiration;
        self
    }

    pub fn with_failed_retry_delay(mut self, delay: Duration) -> Self {
        self.failed_retry_delay = delay;
        self
    }

    pub fn with_retry_source_errors(mut self, retry: bool) -> Self {
        self.retry_source_errors = retry;
        self
    }

    pub fn with_wrap_window(mut self, wrap: bool) -> Self {
        self.wrap_window = wrap;
        self
    }

    pub fn with_max_concurrent_loaders(mut self, limit: usize) -> Self {
        self.max_concurrent_loaders = Some(limit);
        self
    }

    /// Loader count above which outstanding loads are evicted.
    pub fn loader_limit(&self) -> usize {
        self.max_concurrent_loaders
            .unwrap_or(2 * self.window_size + 1)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(PlaybackError::InvalidConfig(
                "window_size must be > 0".to_string(),
            ));
        }

        if self.load_debounce.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "load_debounce must be > 0".to_string(),
            ));
        }

        if self.source_expiration.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "source_expiration must be > 0".to_string(),
            ));
        }

        if self.max_concurrent_loaders == Some(0) {
            return Err(PlaybackError::InvalidConfig(
                "max_concurrent_loaders must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_window_size() -> usize {
    1
}

fn default_load_debounce() -> Duration {
    Duration::from_millis(400)
}

fn default_source_expiration() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_failed_retry_delay() -> Duration {
    Duration::ZERO
}

fn default_retry_source_errors() -> bool {
    true
}

fn default_wrap_window() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.window_size, 1);
        assert_eq!(config.load_debounce, Duration::from_millis(400));
        assert_eq!(config.source_expiration, Duration::from_secs(7200));
        assert_eq!(config.loader_limit(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        let aggressive = ManagerConfig::aggressive_prefetch();
        assert_eq!(aggressive.window_size, 2);
        assert_eq!(aggressive.loader_limit(), 5);
        assert!(aggressive.validate().is_ok());

        let conservative = ManagerConfig::conservative();
        assert_eq!(conservative.load_debounce, Duration::from_millis(800));
        assert!(conservative.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let config = ManagerConfig::default().with_window_size(0);
        assert!(matches!(
            config.validate(),
            Err(PlaybackError::InvalidConfig(_))
        ));

        let config = ManagerConfig::default().with_load_debounce(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = ManagerConfig::default().with_max_concurrent_loaders(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: ManagerConfig = serde_json::from_str(r#"{"window_size": 3}"#).unwrap();
        assert_eq!(config.window_size, 3);
        assert_eq!(config.load_debounce, Duration::from_millis(400));
        assert!(config.wrap_window);
        assert_eq!(config.loader_limit(), 7);
    }
}
