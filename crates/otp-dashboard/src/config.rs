//! Application configuration loaded from environment variables.

use anyhow::{Context, Result};
use otp_poller::{NotificationConfig, PollerConfig, RevealConfig};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Rental API connection
    pub rental_api: RentalApiConfig,

    /// Poll cadence, retry ceiling and heartbeat
    #[serde(default)]
    pub poller: PollerConfig,

    /// Notification channels
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Secret reveal timing
    #[serde(default)]
    pub reveal: RevealConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct RentalApiConfig {
    /// Base URL of the rental API, without the `/rentals` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the rental API
    pub api_key: SecretString,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/api".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Nested keys use `__`, e.g. `RENTAL_API__API_KEY` or
    /// `POLLER__POLL_INTERVAL=2s`.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_builder(config::Config::builder().add_source(
            config::Environment::default()
                .separator("__")
                // Numeric-looking API keys must stay strings.
                .try_parsing(false),
        ))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config
            .poller
            .validate()
            .context("Invalid poller configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_with_only_api_key() {
        let builder = config::Config::builder()
            .set_override("rental_api.api_key", "sk-test-0001")
            .unwrap();
        let config = Config::from_builder(builder).unwrap();

        assert_eq!(config.rental_api.api_key.expose_secret(), "sk-test-0001");
        assert_eq!(config.rental_api.base_url, "http://localhost:3000/api");
        assert_eq!(config.rental_api.timeout, Duration::from_secs(30));
        assert_eq!(config.poller.poll_interval, Duration::from_secs(2));
        assert!(config.notifications.bell);
        assert_eq!(config.reveal.duration, Duration::from_secs(5));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_overrides() {
        let builder = config::Config::builder()
            .set_override("rental_api.api_key", "k")
            .unwrap()
            .set_override("rental_api.timeout", "5s")
            .unwrap()
            .set_override("poller.poll_interval", "3s")
            .unwrap()
            .set_override("poller.heartbeat_enabled", true)
            .unwrap()
            .set_override("log.level", "debug")
            .unwrap();
        let config = Config::from_builder(builder).unwrap();

        assert_eq!(config.rental_api.timeout, Duration::from_secs(5));
        assert_eq!(config.poller.poll_interval, Duration::from_secs(3));
        assert!(config.poller.heartbeat_enabled);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_zero_poll_interval_fails() {
        let builder = config::Config::builder()
            .set_override("rental_api.api_key", "k")
            .unwrap()
            .set_override("poller.poll_interval", "0s")
            .unwrap();
        let err = Config::from_builder(builder).unwrap_err();
        assert!(format!("{:#}", err).contains("poll_interval"));
    }

    #[test]
    fn test_missing_api_key_fails() {
        assert!(Config::from_builder(config::Config::builder()).is_err());
    }
}
