//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Configuration for the session backend and the interactive front end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default SSH handshake timeout; a profile's own timeout wins
    #[serde(with = "duration_secs")]
    pub handshake_timeout: Duration,

    /// Interval between SSH keepalive requests
    #[serde(with = "duration_secs")]
    pub keepalive_interval: Duration,

    /// Bytes buffered per session before its terminal is attached
    pub inbound_buffer_limit: usize,

    /// Capacity of the lifecycle event bus and adapter channels
    pub event_capacity: usize,

    /// Upper bound on the teardown sweep at process exit
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,

    /// TERM value sent with the PTY request
    pub term: String,

    /// Initial PTY width in columns
    pub initial_cols: u32,

    /// Initial PTY height in rows
    pub initial_rows: u32,

    /// Where connection profiles are stored
    pub profiles_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(45),
            keepalive_interval: Duration::from_secs(10),
            inbound_buffer_limit: 256 * 1024,
            event_capacity: 1024,
            shutdown_timeout: Duration::from_secs(5),
            term: "xterm-256color".to_string(),
            initial_cols: 80,
            initial_rows: 24,
            profiles_path: super::default_config_dir().join("profiles.toml"),
        }
    }
}

impl ClientConfig {
    /// Reject values the backend cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "handshake_timeout must be non-zero".to_string(),
            ));
        }
        if self.term.trim().is_empty() {
            return Err(ConfigError::MissingField("term".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.keepalive_interval, Duration::from_secs(10));
        assert_eq!(config.inbound_buffer_limit, 262_144);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str("handshake_timeout = 20\n").unwrap();
        assert_eq!(config.handshake_timeout, Duration::from_secs(20));
        assert_eq!(config.event_capacity, 1024);
        assert_eq!(config.initial_cols, 80);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ClientConfig {
            handshake_timeout: Duration::ZERO,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
