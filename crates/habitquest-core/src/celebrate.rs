//! One-shot celebration triggers derived from progression events.
//!
//! Rapid bursts of `habit_logged` events must not stack confetti: once a
//! trigger fires, further progression events are suppressed until the
//! cooldown window closes. The suppressed events are still recorded in
//! the event log, so nothing is lost, only the duplicate animation.
//!
//! The cooldown is expressed as a deadline checked against the injected
//! clock rather than an armed timer, so session teardown has no timer to
//! cancel.

use std::time::Duration;

use tracing::debug;

use crate::event::{EventKind, Progression, PushEvent};
use crate::types::Timestamp;

/// Cooldown the dashboard used for its level-up overlay
pub const DEFAULT_CELEBRATION_COOLDOWN: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Celebration Kinds
// ----------------------------------------------------------------------------

/// Which animation the UI should play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CelebrationKind {
    LevelUp,
    Achievement,
}

// ----------------------------------------------------------------------------
// Celebration Tracker
// ----------------------------------------------------------------------------

/// Per-session debounced trigger state.
///
/// At most one trigger fires per cooldown window; while a window is
/// open, `observe` returns `None` for further progression events.
#[derive(Debug)]
pub struct CelebrationTracker {
    cooldown: Duration,
    last_trigger_at: Option<Timestamp>,
    pending: Option<Pending>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: CelebrationKind,
    expires_at: Timestamp,
}

impl CelebrationTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_trigger_at: None,
            pending: None,
        }
    }

    /// Inspect a newly appended event; returns the trigger to emit, if any.
    pub fn observe(&mut self, event: &PushEvent, now: Timestamp) -> Option<CelebrationKind> {
        if event.kind != EventKind::HabitLogged {
            return None;
        }

        let progression = Progression::from_payload(&event.payload);
        if !progression.is_celebratory() {
            return None;
        }

        if self.pending_kind_at(now).is_some() {
            debug!(
                sequence = event.sequence,
                "celebration suppressed, cooldown active"
            );
            return None;
        }

        // Level-up outranks achievements when one event carries both
        let kind = if progression.leveled_up {
            CelebrationKind::LevelUp
        } else {
            CelebrationKind::Achievement
        };

        self.last_trigger_at = Some(now);
        self.pending = Some(Pending {
            kind,
            expires_at: now + self.cooldown.as_millis() as u64,
        });
        Some(kind)
    }

    /// The animation currently pending, if the cooldown is still open
    pub fn pending_kind_at(&mut self, now: Timestamp) -> Option<CelebrationKind> {
        if let Some(pending) = self.pending {
            if now >= pending.expires_at {
                self.pending = None;
            }
        }
        self.pending.map(|p| p.kind)
    }

    /// When the last trigger fired, if any
    pub fn last_trigger_at(&self) -> Option<Timestamp> {
        self.last_trigger_at
    }

    /// Clear all state (logout / session switch)
    pub fn reset(&mut self) {
        self.last_trigger_at = None;
        self.pending = None;
    }
}

impl Default for CelebrationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CELEBRATION_COOLDOWN)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn logged_event(sequence: u64, payload: Value) -> PushEvent {
        PushEvent {
            kind: EventKind::HabitLogged,
            payload,
            sequence,
            received_at: Timestamp::new(0),
        }
    }

    fn tracker() -> CelebrationTracker {
        CelebrationTracker::new(Duration::from_secs(5))
    }

    #[test]
    fn test_plain_habit_logged_emits_nothing() {
        let mut tracker = tracker();
        let event = logged_event(0, json!({"xp_earned": 20, "leveled_up": false}));
        assert_eq!(tracker.observe(&event, Timestamp::new(0)), None);
        assert_eq!(tracker.pending_kind_at(Timestamp::new(0)), None);
    }

    #[test]
    fn test_level_up_fires_once_within_cooldown() {
        let mut tracker = tracker();

        let first = logged_event(0, json!({"leveled_up": true}));
        assert_eq!(
            tracker.observe(&first, Timestamp::new(0)),
            Some(CelebrationKind::LevelUp)
        );

        // Second level-up 500ms later: suppressed
        let second = logged_event(1, json!({"leveled_up": true}));
        assert_eq!(tracker.observe(&second, Timestamp::new(500)), None);

        // Third event after the 5s cooldown elapses: fires again
        let third = logged_event(2, json!({"leveled_up": true}));
        assert_eq!(
            tracker.observe(&third, Timestamp::new(5_000)),
            Some(CelebrationKind::LevelUp)
        );
    }

    #[test]
    fn test_achievement_within_level_up_cooldown_is_suppressed() {
        let mut tracker = tracker();

        let level_up = logged_event(0, json!({"leveled_up": true}));
        assert_eq!(
            tracker.observe(&level_up, Timestamp::new(0)),
            Some(CelebrationKind::LevelUp)
        );

        let achievement = logged_event(1, json!({"achievements_unlocked": ["a1"]}));
        assert_eq!(tracker.observe(&achievement, Timestamp::new(500)), None);
        assert_eq!(
            tracker.pending_kind_at(Timestamp::new(500)),
            Some(CelebrationKind::LevelUp)
        );
    }

    #[test]
    fn test_level_up_outranks_achievements_on_same_event() {
        let mut tracker = tracker();
        let both = logged_event(
            0,
            json!({"leveled_up": true, "achievements_unlocked": [{"name": "First Steps"}]}),
        );
        assert_eq!(
            tracker.observe(&both, Timestamp::new(0)),
            Some(CelebrationKind::LevelUp)
        );
    }

    #[test]
    fn test_achievement_only_event_fires_achievement() {
        let mut tracker = tracker();
        let event = logged_event(0, json!({"achievements_unlocked": [{"name": "Early Bird"}]}));
        assert_eq!(
            tracker.observe(&event, Timestamp::new(0)),
            Some(CelebrationKind::Achievement)
        );
    }

    #[test]
    fn test_non_habit_logged_events_are_ignored() {
        let mut tracker = tracker();
        let event = PushEvent {
            kind: EventKind::GoalCompleted,
            payload: json!({"leveled_up": true}),
            sequence: 0,
            received_at: Timestamp::new(0),
        };
        assert_eq!(tracker.observe(&event, Timestamp::new(0)), None);
    }

    #[test]
    fn test_reset_clears_pending_window() {
        let mut tracker = tracker();
        let event = logged_event(0, json!({"leveled_up": true}));
        tracker.observe(&event, Timestamp::new(0));
        assert!(tracker.last_trigger_at().is_some());

        tracker.reset();
        assert_eq!(tracker.last_trigger_at(), None);

        // A fresh session can trigger immediately
        let next = logged_event(1, json!({"leveled_up": true}));
        assert_eq!(
            tracker.observe(&next, Timestamp::new(100)),
            Some(CelebrationKind::LevelUp)
        );
    }
}
