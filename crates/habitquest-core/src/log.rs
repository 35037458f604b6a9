//! Bounded, ordered in-memory record of inbound events.
//!
//! The log is the single source of truth for "what was received, in what
//! order". It is append-only with FIFO eviction past a fixed capacity,
//! replacing the unbounded grow-forever list a long-running client would
//! otherwise accumulate.

use std::collections::VecDeque;

use serde_json::Value;

use crate::event::{EventKind, PushEvent};
use crate::types::Timestamp;
use crate::{CoreError, Result};

// ----------------------------------------------------------------------------
// Event Log
// ----------------------------------------------------------------------------

/// Append-only bounded event log, oldest-first.
///
/// Sequence numbers are strictly increasing and contiguous within the
/// retained window; eviction can only drop entries from the head, so a
/// gap may exist before the oldest retained event but never inside the
/// log.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<PushEvent>,
    capacity: usize,
    next_sequence: u64,
}

impl EventLog {
    /// Create a log retaining at most `capacity` events
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CoreError::ZeroCapacity);
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_sequence: 0,
        })
    }

    /// Append a decoded event, assigning the next sequence number.
    ///
    /// Evicts from the head when the log is full. Amortized O(1).
    pub fn append(&mut self, kind: EventKind, payload: Value, now: Timestamp) -> &PushEvent {
        let event = PushEvent {
            kind,
            payload,
            sequence: self.next_sequence,
            received_at: now,
        };
        self.next_sequence += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
        self.entries.back().expect("just pushed")
    }

    /// The last `n` events in arrival order (fewer if the log is shorter)
    pub fn recent(&self, n: usize) -> Vec<PushEvent> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).cloned().collect()
    }

    /// Iterate all retained events, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PushEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The sequence number the next appended event will receive
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Drop all entries and restart sequencing (session switch)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_sequence = 0;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn append_n(log: &mut EventLog, count: u64) {
        for i in 0..count {
            log.append(
                EventKind::Nudge,
                json!({"message": format!("event {i}")}),
                Timestamp::new(1_000 + i),
            );
        }
    }

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(matches!(EventLog::new(0), Err(CoreError::ZeroCapacity)));
    }

    #[test]
    fn test_sequences_are_strictly_increasing_and_contiguous() {
        let mut log = EventLog::new(10).unwrap();
        append_n(&mut log, 5);

        let sequences: Vec<u64> = log.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
        assert_eq!(log.next_sequence(), 5);
    }

    #[test]
    fn test_recent_returns_tail_in_arrival_order() {
        let mut log = EventLog::new(10).unwrap();
        append_n(&mut log, 7);

        let window = log.recent(3);
        let sequences: Vec<u64> = window.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![4, 5, 6]);

        // Asking for more than is retained returns everything
        assert_eq!(log.recent(100).len(), 7);
        // recent() does not mutate
        assert_eq!(log.len(), 7);
    }

    #[test]
    fn test_eviction_keeps_most_recent_at_capacity() {
        let mut log = EventLog::new(3).unwrap();
        append_n(&mut log, 8);

        assert_eq!(log.len(), 3);
        let sequences: Vec<u64> = log.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![5, 6, 7]);
        // Contiguous within the log even after eviction
        assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
    }

    #[test]
    fn test_recent_on_empty_log() {
        let log = EventLog::new(4).unwrap();
        assert!(log.is_empty());
        assert!(log.recent(5).is_empty());
    }
}
