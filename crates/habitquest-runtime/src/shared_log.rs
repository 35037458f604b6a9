//! Shared event log and channel-based subscription fan-out.
//!
//! The core [`EventLog`] is single-owner; this module wraps it for the
//! runtime, where one connection task writes and any number of consumers
//! read. Subscribers receive events over per-subscription channels, and
//! fan-out happens under the append lock so every subscriber observes
//! events in append order, each exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use habitquest_core::{EventKind, EventLog, PushEvent, Timestamp};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

// ----------------------------------------------------------------------------
// Subscription Fan-out
// ----------------------------------------------------------------------------

/// Opaque handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// A registered subscription and its receiving end
pub struct Subscription<T> {
    pub token: SubscriptionToken,
    pub receiver: mpsc::UnboundedReceiver<T>,
}

/// Ordered broadcast to a dynamic set of channel subscribers.
///
/// Unsubscribing stops future delivery; events already sent stay in the
/// subscriber's channel.
#[derive(Debug)]
pub(crate) struct SignalFanout<T> {
    senders: HashMap<u64, mpsc::UnboundedSender<T>>,
    next_token: u64,
}

impl<T: Clone> SignalFanout<T> {
    pub(crate) fn new() -> Self {
        Self {
            senders: HashMap::new(),
            next_token: 0,
        }
    }

    pub(crate) fn subscribe(&mut self) -> Subscription<T> {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.insert(token.0, sender);
        Subscription { token, receiver }
    }

    pub(crate) fn unsubscribe(&mut self, token: SubscriptionToken) {
        self.senders.remove(&token.0);
    }

    pub(crate) fn emit(&mut self, value: &T) {
        // Dropped receivers are pruned on the next emit
        self.senders
            .retain(|_, sender| sender.send(value.clone()).is_ok());
    }
}

// ----------------------------------------------------------------------------
// Shared Event Log
// ----------------------------------------------------------------------------

/// Clonable handle to the session's event log.
///
/// Single writer (the connection task), any number of readers. The lock
/// is never held across an await point.
#[derive(Clone)]
pub struct SharedEventLog {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    log: EventLog,
    fanout: SignalFanout<PushEvent>,
}

impl SharedEventLog {
    pub fn new(capacity: usize) -> Result<Self> {
        let log = EventLog::new(capacity)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                log,
                fanout: SignalFanout::new(),
            })),
        })
    }

    /// Append a decoded event and deliver it to all subscribers in order
    pub fn append(&self, kind: EventKind, payload: Value, now: Timestamp) -> PushEvent {
        let mut inner = self.inner.lock().expect("event log lock");
        let event = inner.log.append(kind, payload, now).clone();
        inner.fanout.emit(&event);
        event
    }

    /// The last `n` events in arrival order
    pub fn recent(&self, n: usize) -> Vec<PushEvent> {
        self.inner.lock().expect("event log lock").log.recent(n)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("event log lock").log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("event log lock").log.is_empty()
    }

    /// Register a consumer for every event appended from now on
    pub fn subscribe(&self) -> Subscription<PushEvent> {
        self.inner.lock().expect("event log lock").fanout.subscribe()
    }

    /// Drop all entries and restart sequencing. Used on session switch;
    /// subscriptions survive and will see the new session's events.
    pub fn clear(&self) {
        self.inner.lock().expect("event log lock").log.clear();
    }

    /// Stop delivery for a subscription; already-delivered events remain
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner
            .lock()
            .expect("event log lock")
            .fanout
            .unsubscribe(token);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn append_nudge(log: &SharedEventLog, i: u64) -> PushEvent {
        log.append(
            EventKind::Nudge,
            json!({"message": format!("n{i}")}),
            Timestamp::new(i),
        )
    }

    #[test]
    fn test_append_and_recent_through_shared_handle() {
        let log = SharedEventLog::new(3).unwrap();
        for i in 0..5 {
            append_nudge(&log, i);
        }
        assert_eq!(log.len(), 3);
        let sequences: Vec<u64> = log.recent(10).iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_subscribers_see_events_in_order_exactly_once() {
        let log = SharedEventLog::new(10).unwrap();
        let mut sub = log.subscribe();

        for i in 0..4 {
            append_nudge(&log, i);
        }

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(sub.receiver.recv().await.unwrap().sequence);
        }
        assert_eq!(received, vec![0, 1, 2, 3]);
        // Nothing further pending
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_future_delivery_only() {
        let log = SharedEventLog::new(10).unwrap();
        let mut sub = log.subscribe();

        append_nudge(&log, 0);
        log.unsubscribe(sub.token);
        append_nudge(&log, 1);

        // The pre-unsubscribe event is still delivered
        assert_eq!(sub.receiver.recv().await.unwrap().sequence, 0);
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block_others() {
        let log = SharedEventLog::new(10).unwrap();
        let dropped = log.subscribe();
        let mut live = log.subscribe();
        drop(dropped.receiver);

        append_nudge(&log, 0);
        assert_eq!(live.receiver.recv().await.unwrap().sequence, 0);
    }
}
