//! Core application configuration.
//!
//! [`Config`] holds everything the composition root needs to wire rooms to
//! their external collaborators. The server binary builds it from YAML and
//! environment overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    EVENT_CHANNEL_CAPACITY, HTTP_TIMEOUT_SECS, SIGNAL_CHANNEL_CAPACITY,
    TIMER_CHECKPOINT_INTERVAL_MS,
};

/// Configuration for the MusicRoom core.
///
/// All fields have sensible defaults except the two collaborator URLs, which
/// default to a local development backend.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Origin prefixes allowed to call the API from a browser.
    pub trusted_origins: Vec<String>,

    // Collaborators
    /// Base URL of the rendering backend receiving play/pause/ack notifications.
    pub backend_url: String,

    /// Base URL of the track metadata catalog.
    pub catalog_url: String,

    /// Timeout for backend and catalog requests (seconds).
    pub http_timeout_secs: u64,

    // Rooms
    /// Interval between liveness checkpoints of a running track timer (milliseconds).
    pub timer_checkpoint_interval_ms: u64,

    /// Capacity of each room's inbound signal channel.
    pub signal_channel_capacity: usize,

    /// Capacity of the domain event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.backend_url.trim().is_empty() {
            return Err("backend_url must not be empty".to_string());
        }
        if self.catalog_url.trim().is_empty() {
            return Err("catalog_url must not be empty".to_string());
        }
        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be >= 1".to_string());
        }
        if self.timer_checkpoint_interval_ms == 0 {
            return Err("timer_checkpoint_interval_ms must be >= 1".to_string());
        }
        if self.signal_channel_capacity == 0 {
            return Err("signal_channel_capacity must be >= 1 (mpsc::channel panics on 0)".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        Ok(())
    }

    /// Checkpoint interval as a [`Duration`].
    #[must_use]
    pub fn timer_checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.timer_checkpoint_interval_ms)
    }

    /// HTTP request timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            trusted_origins: vec![
                "http://localhost".to_string(),
                "http://127.0.0.1".to_string(),
            ],
            backend_url: "http://localhost:3333".to_string(),
            catalog_url: "http://localhost:3333".to_string(),
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            timer_checkpoint_interval_ms: TIMER_CHECKPOINT_INTERVAL_MS,
            signal_channel_capacity: SIGNAL_CHANNEL_CAPACITY,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}
