//! HabitQuest Core
//!
//! Foundational types and logic for the HabitQuest real-time client:
//! the decoded event model, the bounded in-memory event log, the
//! notification deriver, and the celebration (gamification trigger)
//! tracker. This crate performs no IO; everything here is deterministic
//! and driven by an injected [`TimeSource`], which is what makes the
//! debounce and retention behavior unit-testable with a manual clock.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod celebrate;
pub mod event;
pub mod log;
pub mod notify;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use celebrate::{CelebrationKind, CelebrationTracker};
pub use event::{AchievementRecord, Envelope, EventKind, Progression, PushEvent};
pub use log::EventLog;
pub use notify::{derive_notifications, Notification, NotificationCategory};
pub use types::{ManualTimeSource, SessionToken, SystemTimeSource, TimeSource, Timestamp};

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Core error types for the HabitQuest client
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid session credential: {0}")]
    InvalidSession(&'static str),

    #[error("malformed inbound message: {0}")]
    Decode(String),

    #[error("failed to serialize outbound message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("event log capacity must be non-zero")]
    ZeroCapacity,
}

pub type Result<T> = core::result::Result<T, CoreError>;
