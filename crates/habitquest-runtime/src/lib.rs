//! HabitQuest Runtime
//!
//! Tokio-based push connection manager for the HabitQuest client. One
//! [`PushClient`] per user session maintains a WebSocket to the server,
//! recovers from drops with a fixed-delay retry, appends decoded events
//! to the shared bounded event log, and fans out events and celebration
//! signals to channel subscribers.
//!
//! Failure policy: only configuration errors (bad credential, bad
//! endpoint) surface to callers. Transport drops become reconnect
//! cycles; malformed inbound frames are dropped before they reach the
//! event log; sends while disconnected are silent no-ops.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod client;
pub mod config;
pub mod error;
pub mod link;
pub mod shared_log;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use client::PushClient;
pub use config::PushConfig;
pub use error::{PushError, Result};
pub use link::LinkState;
pub use shared_log::{SharedEventLog, Subscription, SubscriptionToken};
pub use transport::{Frame, PushSocket, PushTransport, WebSocketTransport};
