//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use musicroom_core::protocol_constants::{HTTP_TIMEOUT_SECS, TIMER_CHECKPOINT_INTERVAL_MS};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = first free port of the default range).
    /// Override: `MUSICROOM_BIND_PORT`
    pub bind_port: u16,

    /// Base URL of the rendering backend.
    /// Override: `MUSICROOM_BACKEND_URL`
    pub backend_url: String,

    /// Base URL of the track metadata catalog.
    /// Override: `MUSICROOM_CATALOG_URL`
    pub catalog_url: String,

    /// Timeout for backend and catalog requests, in seconds.
    /// Override: `MUSICROOM_HTTP_TIMEOUT_SECS`
    pub http_timeout_secs: u64,

    /// Interval between track timer checkpoints, in milliseconds.
    /// Override: `MUSICROOM_TIMER_CHECKPOINT_INTERVAL_MS`
    pub timer_checkpoint_interval_ms: u64,

    /// Origin prefixes allowed to call the API from a browser.
    pub trusted_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = musicroom_core::Config::default();
        Self {
            bind_port: 49500,
            backend_url: core.backend_url,
            catalog_url: core.catalog_url,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            timer_checkpoint_interval_ms: TIMER_CHECKPOINT_INTERVAL_MS,
            trusted_origins: core.trusted_origins,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Applies `MUSICROOM_*` overrides. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("MUSICROOM_BIND_PORT").and_then(|v| v.parse().ok()) {
            self.bind_port = port;
        }
        if let Some(url) = lookup("MUSICROOM_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(url) = lookup("MUSICROOM_CATALOG_URL") {
            self.catalog_url = url;
        }
        if let Some(secs) = lookup("MUSICROOM_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.http_timeout_secs = secs;
        }
        if let Some(ms) =
            lookup("MUSICROOM_TIMER_CHECKPOINT_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.timer_checkpoint_interval_ms = ms;
        }
    }

    /// Converts to musicroom-core's Config type.
    pub fn to_core_config(&self) -> musicroom_core::Config {
        musicroom_core::Config {
            preferred_port: self.bind_port,
            trusted_origins: self.trusted_origins.clone(),
            backend_url: self.backend_url.clone(),
            catalog_url: self.catalog_url.clone(),
            http_timeout_secs: self.http_timeout_secs,
            timer_checkpoint_interval_ms: self.timer_checkpoint_interval_ms,
            ..Default::default()
        }
    }
}
