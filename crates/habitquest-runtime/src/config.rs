//! Configuration for the push connection runtime

use std::time::Duration;

use habitquest_core::celebrate::DEFAULT_CELEBRATION_COOLDOWN;
use habitquest_core::notify::DEFAULT_NOTIFICATION_WINDOW;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Push Configuration
// ----------------------------------------------------------------------------

/// Configuration for a push client instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Base URL of the push server, e.g. `ws://localhost:8000`.
    /// The client connects to `{base_url}/ws?token=<credential>`.
    pub base_url: String,
    /// Fixed delay between reconnection attempts.
    ///
    /// Deliberately not exponential: the source system favors prompt
    /// recovery for a low-traffic personal tool. Deployments with higher
    /// fanout should tune this instead of assuming backoff.
    pub reconnect_delay: Duration,
    /// Maximum number of events retained in the event log
    pub log_capacity: usize,
    /// Suppression window after a celebration trigger fires
    pub celebration_cooldown: Duration,
    /// Number of trailing events considered when deriving notifications
    pub notification_window: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://localhost:8000".to_string(),
            reconnect_delay: Duration::from_secs(3),
            log_capacity: 500,
            celebration_cooldown: DEFAULT_CELEBRATION_COOLDOWN,
            notification_window: DEFAULT_NOTIFICATION_WINDOW,
        }
    }
}

impl PushConfig {
    /// Configuration pointing at a specific server
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Configuration for local development against a dev server
    pub fn local_development() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            ..Self::default()
        }
    }
}
