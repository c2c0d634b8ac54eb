//! Poller configuration.

use crate::error::PollerError;
use serde::Deserialize;
use std::time::Duration;

/// Polling cadence and retry limits.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Interval between OTP checks for one session.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Transient failures tolerated per session before it is failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Periodically re-read the whole rental list while numbers are waiting.
    #[serde(default)]
    pub heartbeat_enabled: bool,

    /// Interval of the rental list refresh.
    #[serde(default = "default_heartbeat_interval", with = "humantime_serde")]
    pub heartbeat_interval: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_retries() -> u32 {
    rental_store::DEFAULT_MAX_RETRIES
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(10)
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_retries: default_max_retries(),
            heartbeat_enabled: false,
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

impl PollerConfig {
    /// Reject intervals the timers cannot tick at.
    pub fn validate(&self) -> Result<(), PollerError> {
        if self.poll_interval.is_zero() {
            return Err(PollerError::Config("poll_interval must be greater than zero".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(PollerError::Config(
                "heartbeat_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Which notification channels fire when a code arrives.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Audible tone.
    #[serde(default = "default_true")]
    pub bell: bool,

    /// Whether system notifications are permitted.
    #[serde(default = "default_true")]
    pub desktop_permission: bool,

    /// Celebratory banner.
    #[serde(default)]
    pub celebration: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            bell: true,
            desktop_permission: true,
            celebration: false,
        }
    }
}

/// Secret reveal timing.
#[derive(Debug, Clone, Deserialize)]
pub struct RevealConfig {
    /// How long a revealed secret stays visible.
    #[serde(default = "default_reveal_duration", with = "humantime_serde")]
    pub duration: Duration,
}

fn default_reveal_duration() -> Duration {
    Duration::from_secs(5)
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            duration: default_reveal_duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PollerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_retries, 900);
        assert!(!config.heartbeat_enabled);

        assert_eq!(RevealConfig::default().duration, Duration::from_secs(5));
    }

    #[test]
    fn test_humantime_durations() {
        let config: PollerConfig = serde_json::from_str(
            r#"{ "poll_interval": "500ms", "heartbeat_enabled": true, "heartbeat_interval": "1m" }"#,
        )
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert!(config.heartbeat_enabled);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        assert!(PollerConfig::default().validate().is_ok());

        let config: PollerConfig = serde_json::from_str(r#"{ "poll_interval": "0s" }"#).unwrap();
        assert!(matches!(config.validate(), Err(PollerError::Config(_))));

        let config = PollerConfig {
            heartbeat_interval: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat_interval"));
    }
}
