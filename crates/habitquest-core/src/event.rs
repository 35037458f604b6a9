//! Decoded event model and the `{type, data}` wire envelope.
//!
//! Every inbound push message is a single JSON object with a string
//! `type` tag and an opaque `data` payload. The client recognizes the
//! four tags the notification deriver cares about; any other tag (the
//! server also emits `connected` and `pong`) is retained in the event
//! log under [`EventKind::Other`] and ignored downstream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Timestamp;
use crate::{CoreError, Result};

// ----------------------------------------------------------------------------
// Event Kinds
// ----------------------------------------------------------------------------

/// Classification tag of an inbound push event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A habit's streak is about to break
    HabitAtRisk,
    /// Server-initiated reminder message
    Nudge,
    /// A habit completion was recorded, possibly with progression
    HabitLogged,
    /// A goal reached its target
    GoalCompleted,
    /// Any tag the client does not interpret
    Other(String),
}

impl EventKind {
    /// Map a wire tag onto a kind
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "habit_at_risk" => Self::HabitAtRisk,
            "nudge" => Self::Nudge,
            "habit_logged" => Self::HabitLogged,
            "goal_completed" => Self::GoalCompleted,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire tag for this kind
    pub fn as_tag(&self) -> &str {
        match self {
            Self::HabitAtRisk => "habit_at_risk",
            Self::Nudge => "nudge",
            Self::HabitLogged => "habit_logged",
            Self::GoalCompleted => "goal_completed",
            Self::Other(tag) => tag,
        }
    }
}

// ----------------------------------------------------------------------------
// Push Event
// ----------------------------------------------------------------------------

/// One decoded inbound message, immutable after construction.
///
/// The sequence number is assigned by the event log at arrival and is
/// strictly increasing for the lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub kind: EventKind,
    pub payload: Value,
    pub sequence: u64,
    pub received_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Wire Envelope
// ----------------------------------------------------------------------------

/// The `{type, data}` JSON envelope used in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Decode an inbound text frame.
    ///
    /// Strict: the frame must be a JSON object carrying a string `type`.
    /// Callers drop the frame on error; a malformed message must never
    /// reach the event log.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CoreError::Decode(e.to_string()))?;
        if !value.is_object() {
            return Err(CoreError::Decode("message is not a JSON object".into()));
        }
        if !value.get("type").map(Value::is_string).unwrap_or(false) {
            return Err(CoreError::Decode("missing string `type` tag".into()));
        }
        serde_json::from_value(value).map_err(|e| CoreError::Decode(e.to_string()))
    }

    /// Encode for an outbound text frame
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ----------------------------------------------------------------------------
// Progression Payload View
// ----------------------------------------------------------------------------

/// An achievement carried on a `habit_logged` payload.
///
/// The server sends full achievement records; only the fields the client
/// displays are pulled out, and all of them are optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AchievementRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Parsed progression view of a `habit_logged` payload.
///
/// Tolerant of missing fields: a payload with none of them parses to the
/// default (no XP, no level-up, no achievements).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progression {
    pub xp_earned: Option<u64>,
    pub leveled_up: bool,
    pub achievements_unlocked: Vec<AchievementRecord>,
}

impl Progression {
    /// Extract progression flags from an event payload
    pub fn from_payload(payload: &Value) -> Self {
        let xp_earned = payload.get("xp_earned").and_then(Value::as_u64);
        let leveled_up = payload
            .get("leveled_up")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let achievements_unlocked = payload
            .get("achievements_unlocked")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        // Bare strings ("a1") and full records both occur
                        if let Some(name) = entry.as_str() {
                            AchievementRecord {
                                name: Some(name.to_string()),
                                ..AchievementRecord::default()
                            }
                        } else {
                            serde_json::from_value(entry.clone()).unwrap_or_default()
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            xp_earned,
            leveled_up,
            achievements_unlocked,
        }
    }

    /// Whether this payload should raise a celebration trigger
    pub fn is_celebratory(&self) -> bool {
        self.leveled_up || !self.achievements_unlocked.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip_for_recognized_tags() {
        for tag in ["habit_at_risk", "nudge", "habit_logged", "goal_completed"] {
            let kind = EventKind::from_tag(tag);
            assert!(!matches!(kind, EventKind::Other(_)));
            assert_eq!(kind.as_tag(), tag);
        }
    }

    #[test]
    fn test_unrecognized_tag_is_preserved() {
        let kind = EventKind::from_tag("connected");
        assert_eq!(kind, EventKind::Other("connected".to_string()));
        assert_eq!(kind.as_tag(), "connected");
    }

    #[test]
    fn test_decode_valid_envelope() {
        let envelope =
            Envelope::decode(r#"{"type": "nudge", "data": {"message": "Keep it up!"}}"#).unwrap();
        assert_eq!(envelope.kind, "nudge");
        assert_eq!(envelope.data["message"], "Keep it up!");
    }

    #[test]
    fn test_decode_missing_data_defaults_to_null() {
        let envelope = Envelope::decode(r#"{"type": "pong"}"#).unwrap();
        assert_eq!(envelope.kind, "pong");
        assert!(envelope.data.is_null());
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(Envelope::decode("not json").is_err());
        assert!(Envelope::decode(r#""just a string""#).is_err());
        assert!(Envelope::decode(r#"{"data": {}}"#).is_err());
        assert!(Envelope::decode(r#"{"type": 7, "data": {}}"#).is_err());
    }

    #[test]
    fn test_encode_produces_wire_shape() {
        let envelope = Envelope::new("habit_logged", json!({"habit_id": 3}));
        let text = envelope.encode().unwrap();
        let back = Envelope::decode(&text).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_progression_from_full_payload() {
        let payload = json!({
            "xp_earned": 70,
            "leveled_up": true,
            "achievements_unlocked": [
                {"id": 4, "name": "Week Warrior", "description": "7-day streak"}
            ]
        });
        let progression = Progression::from_payload(&payload);
        assert_eq!(progression.xp_earned, Some(70));
        assert!(progression.leveled_up);
        assert_eq!(progression.achievements_unlocked.len(), 1);
        assert_eq!(
            progression.achievements_unlocked[0].name.as_deref(),
            Some("Week Warrior")
        );
        assert!(progression.is_celebratory());
    }

    #[test]
    fn test_progression_tolerates_sparse_payloads() {
        let progression = Progression::from_payload(&json!({"xp_earned": 20}));
        assert_eq!(progression.xp_earned, Some(20));
        assert!(!progression.leveled_up);
        assert!(progression.achievements_unlocked.is_empty());
        assert!(!progression.is_celebratory());

        let empty = Progression::from_payload(&json!({}));
        assert_eq!(empty, Progression::default());
    }

    #[test]
    fn test_progression_accepts_bare_string_achievements() {
        let progression =
            Progression::from_payload(&json!({"achievements_unlocked": ["a1", "a2"]}));
        assert_eq!(progression.achievements_unlocked.len(), 2);
        assert_eq!(
            progression.achievements_unlocked[0].name.as_deref(),
            Some("a1")
        );
        assert!(progression.is_celebratory());
    }
}
