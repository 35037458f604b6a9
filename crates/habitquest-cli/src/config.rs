//! Optional TOML configuration for the watcher

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use habitquest_runtime::PushConfig;
use serde::Deserialize;

// ----------------------------------------------------------------------------
// File Configuration
// ----------------------------------------------------------------------------

/// Top-level config file shape
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub push: PushSection,
}

/// `[push]` section; every field falls back to the runtime default
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PushSection {
    pub base_url: Option<String>,
    /// Session credential; a `--token` flag or `HABITQUEST_TOKEN` wins
    /// over this
    pub token: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
    pub log_capacity: Option<usize>,
    pub celebration_cooldown_ms: Option<u64>,
    pub notification_window: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Credential from the file, if one was configured
    pub fn token(&self) -> Option<&str> {
        self.push.token.as_deref()
    }

    pub fn into_push_config(self) -> PushConfig {
        let mut config = PushConfig::default();
        if let Some(base_url) = self.push.base_url {
            config.base_url = base_url;
        }
        if let Some(ms) = self.push.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(capacity) = self.push.log_capacity {
            config.log_capacity = capacity;
        }
        if let Some(ms) = self.push.celebration_cooldown_ms {
            config.celebration_cooldown = Duration::from_millis(ms);
        }
        if let Some(window) = self.push.notification_window {
            config.notification_window = window;
        }
        config
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
