//! Server configuration module
//! Handles dynamic configuration parameters for the relay server

use crate::constants::{
    DEFAULT_HOST, DEFAULT_PORT, FLOOD_AUTO_MUTE_SECS, FLOOD_MAX_MESSAGES, FLOOD_SWEEP_SECS,
    FLOOD_WINDOW_SECS, MAX_MESSAGE_LENGTH, MODERATION_SWEEP_SECS,
};
use crate::error::{RelayError, Result};
use std::env;
use std::time::Duration;

/// Relay server configuration parameters
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Sends allowed per user within the flood window
    pub flood_max_messages: usize,
    /// Trailing window inspected by the flood check, in seconds
    pub flood_window_secs: i64,
    /// Length of the automatic mute issued on flooding, in seconds
    pub flood_auto_mute_secs: i64,
    /// Interval of the flood window garbage-collection sweep
    pub flood_sweep_interval: Duration,
    /// Interval of the expired moderation record sweep
    pub moderation_sweep_interval: Duration,
    /// Maximum accepted message content length, in characters
    pub max_message_length: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            flood_max_messages: FLOOD_MAX_MESSAGES,
            flood_window_secs: FLOOD_WINDOW_SECS,
            flood_auto_mute_secs: FLOOD_AUTO_MUTE_SECS,
            flood_sweep_interval: Duration::from_secs(FLOOD_SWEEP_SECS),
            moderation_sweep_interval: Duration::from_secs(MODERATION_SWEEP_SECS),
            max_message_length: MAX_MESSAGE_LENGTH,
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let host = env::var("CHAT_RELAY_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env::var("CHAT_RELAY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let flood_max_messages = env::var("CHAT_RELAY_FLOOD_MAX_MESSAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(FLOOD_MAX_MESSAGES);

        let flood_window_secs = env::var("CHAT_RELAY_FLOOD_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(FLOOD_WINDOW_SECS);

        let flood_auto_mute_secs = env::var("CHAT_RELAY_FLOOD_MUTE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(FLOOD_AUTO_MUTE_SECS);

        let flood_sweep_secs = env::var("CHAT_RELAY_FLOOD_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(FLOOD_SWEEP_SECS);

        let moderation_sweep_secs = env::var("CHAT_RELAY_MODERATION_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(MODERATION_SWEEP_SECS);

        let max_message_length = env::var("CHAT_RELAY_MAX_MESSAGE_LENGTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(MAX_MESSAGE_LENGTH);

        let config = Self {
            host,
            port,
            flood_max_messages,
            flood_window_secs,
            flood_auto_mute_secs,
            flood_sweep_interval: Duration::from_secs(flood_sweep_secs),
            moderation_sweep_interval: Duration::from_secs(moderation_sweep_secs),
            max_message_length,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration for tests, bound to an ephemeral local port
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.flood_max_messages == 0 {
            return Err(RelayError::ConfigError(
                "CHAT_RELAY_FLOOD_MAX_MESSAGES must be at least 1".to_string(),
            ));
        }
        if self.flood_window_secs <= 0 {
            return Err(RelayError::ConfigError(
                "CHAT_RELAY_FLOOD_WINDOW_SECS must be positive".to_string(),
            ));
        }
        if self.flood_auto_mute_secs <= 0 {
            return Err(RelayError::ConfigError(
                "CHAT_RELAY_FLOOD_MUTE_SECS must be positive".to_string(),
            ));
        }
        if self.max_message_length == 0 {
            return Err(RelayError::ConfigError(
                "CHAT_RELAY_MAX_MESSAGE_LENGTH must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
