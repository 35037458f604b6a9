//! Stateless projection of an event window into user-facing notifications.
//!
//! A pure function of the window: same input, same output, no side
//! effects. The runtime recomputes it only when the event log changes,
//! never on unrelated UI activity.

use serde_json::Value;

use crate::event::{EventKind, Progression, PushEvent};

/// Window size the dashboard uses when deriving notifications
pub const DEFAULT_NOTIFICATION_WINDOW: usize = 5;

// ----------------------------------------------------------------------------
// Notification Types
// ----------------------------------------------------------------------------

/// User-facing category of a derived notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    /// A habit's streak is in danger
    RiskAlert,
    /// A server reminder to act
    Nudge,
    /// A habit completion entry for the activity feed
    Activity,
    /// A goal reached its target
    GoalCompleted,
}

/// One classified notification derived from a logged event
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub category: NotificationCategory,
    /// Sequence of the event this notification was derived from
    pub sequence: u64,
    pub headline: String,
    pub detail: Option<String>,
}

// ----------------------------------------------------------------------------
// Derivation
// ----------------------------------------------------------------------------

/// Classify a window of events into notifications, preserving order.
///
/// Unrecognized event kinds produce nothing; they stay in the event log
/// but never surface to the user.
pub fn derive_notifications(window: &[PushEvent]) -> Vec<Notification> {
    window.iter().filter_map(classify).collect()
}

fn classify(event: &PushEvent) -> Option<Notification> {
    match &event.kind {
        EventKind::HabitAtRisk => Some(Notification {
            category: NotificationCategory::RiskAlert,
            sequence: event.sequence,
            headline: match field_str(&event.payload, "habit_name")
                .or_else(|| field_str(&event.payload, "habit_id"))
            {
                Some(habit) => format!("Habit at risk: {habit}"),
                None => "Habit at risk".to_string(),
            },
            detail: field_str(&event.payload, "reason"),
        }),
        EventKind::Nudge => Some(Notification {
            category: NotificationCategory::Nudge,
            sequence: event.sequence,
            headline: field_str(&event.payload, "message")
                .unwrap_or_else(|| "Time to check in".to_string()),
            detail: None,
        }),
        EventKind::HabitLogged => {
            let progression = Progression::from_payload(&event.payload);
            Some(Notification {
                category: NotificationCategory::Activity,
                sequence: event.sequence,
                headline: match progression.xp_earned {
                    Some(xp) => format!("Habit logged (+{xp} XP)"),
                    None => "Habit logged".to_string(),
                },
                detail: field_str(&event.payload, "habit_name"),
            })
        }
        EventKind::GoalCompleted => Some(Notification {
            category: NotificationCategory::GoalCompleted,
            sequence: event.sequence,
            headline: match field_str(&event.payload, "goal_name")
                .or_else(|| field_str(&event.payload, "goal_id"))
            {
                Some(goal) => format!("Goal completed: {goal}"),
                None => "Goal completed".to_string(),
            },
            detail: None,
        }),
        EventKind::Other(_) => None,
    }
}

/// String view of a payload field; numbers are rendered for id fields
fn field_str(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;
    use serde_json::json;

    fn event(sequence: u64, tag: &str, payload: Value) -> PushEvent {
        PushEvent {
            kind: EventKind::from_tag(tag),
            payload,
            sequence,
            received_at: Timestamp::new(1_000 + sequence),
        }
    }

    #[test]
    fn test_each_recognized_tag_maps_to_its_category() {
        let window = vec![
            event(0, "habit_at_risk", json!({"habit_name": "Reading", "reason": "2 days missed"})),
            event(1, "nudge", json!({"message": "Don't break the streak!"})),
            event(2, "habit_logged", json!({"xp_earned": 20})),
            event(3, "goal_completed", json!({"goal_name": "Run 100km"})),
        ];

        let notifications = derive_notifications(&window);
        let categories: Vec<NotificationCategory> =
            notifications.iter().map(|n| n.category).collect();
        assert_eq!(
            categories,
            vec![
                NotificationCategory::RiskAlert,
                NotificationCategory::Nudge,
                NotificationCategory::Activity,
                NotificationCategory::GoalCompleted,
            ]
        );
        assert_eq!(notifications[0].headline, "Habit at risk: Reading");
        assert_eq!(notifications[0].detail.as_deref(), Some("2 days missed"));
        assert_eq!(notifications[1].headline, "Don't break the streak!");
        assert_eq!(notifications[2].headline, "Habit logged (+20 XP)");
        assert_eq!(notifications[3].headline, "Goal completed: Run 100km");
    }

    #[test]
    fn test_unrecognized_tags_are_excluded() {
        let window = vec![
            event(0, "connected", json!({"message": "WebSocket connected"})),
            event(1, "pong", json!({"message": "Received"})),
            event(2, "nudge", json!({"message": "hi"})),
        ];

        let notifications = derive_notifications(&window);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].sequence, 2);
    }

    #[test]
    fn test_derivation_is_deterministic_and_ordered() {
        let window = vec![
            event(4, "habit_logged", json!({"xp_earned": 10})),
            event(5, "habit_logged", json!({})),
        ];

        let first = derive_notifications(&window);
        let second = derive_notifications(&window);
        assert_eq!(first, second);
        assert_eq!(first[0].sequence, 4);
        assert_eq!(first[1].sequence, 5);
        assert_eq!(first[1].headline, "Habit logged");
    }

    #[test]
    fn test_empty_window_derives_nothing() {
        assert!(derive_notifications(&[]).is_empty());
    }
}
