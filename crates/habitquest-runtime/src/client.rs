//! Public handle to the push subsystem.
//!
//! A [`PushClient`] owns at most one connection task at a time. It is
//! constructed once and handed to consumers explicitly; there is no
//! ambient singleton. Consumers read events and celebration signals over
//! per-subscription channels and never mutate shared state.

use std::sync::Arc;

use habitquest_core::{
    derive_notifications, CelebrationKind, Envelope, Notification, PushEvent, SessionToken,
    SystemTimeSource, TimeSource,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::PushConfig;
use crate::error::Result;
use crate::link::{endpoint_url, CelebrationHub, LinkCommand, LinkState, LinkTask};
use crate::shared_log::{SharedEventLog, Subscription, SubscriptionToken};
use crate::transport::{PushTransport, WebSocketTransport};

// ----------------------------------------------------------------------------
// Push Client
// ----------------------------------------------------------------------------

/// Client-side manager for one logical push channel.
///
/// Generic over the clock so debounce and retention timing can be driven
/// by a manual time source in tests; production uses the system clock.
pub struct PushClient<C: TimeSource + Clone + Send + 'static = SystemTimeSource> {
    config: PushConfig,
    transport: Arc<dyn PushTransport>,
    clock: C,
    log: SharedEventLog,
    celebrations: CelebrationHub,
    state: Arc<watch::Sender<LinkState>>,
    state_rx: watch::Receiver<LinkState>,
    active: Option<ActiveLink>,
}

struct ActiveLink {
    session: SessionToken,
    commands: mpsc::UnboundedSender<LinkCommand>,
    handle: JoinHandle<()>,
}

impl PushClient<SystemTimeSource> {
    /// Create a client using the production WebSocket transport
    pub fn new(config: PushConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(WebSocketTransport))
    }

    /// Create a client with a custom transport implementation
    pub fn with_transport(config: PushConfig, transport: Arc<dyn PushTransport>) -> Result<Self> {
        Self::with_parts(config, transport, SystemTimeSource)
    }
}

impl<C: TimeSource + Clone + Send + 'static> PushClient<C> {
    /// Create a client with explicit transport and clock
    pub fn with_parts(
        config: PushConfig,
        transport: Arc<dyn PushTransport>,
        clock: C,
    ) -> Result<Self> {
        let log = SharedEventLog::new(config.log_capacity)?;
        let (state, state_rx) = watch::channel(LinkState::Idle);
        Ok(Self {
            config,
            transport,
            clock,
            log,
            celebrations: CelebrationHub::new(),
            state: Arc::new(state),
            state_rx,
            active: None,
        })
    }

    /// Start (or keep) the push channel for a session.
    ///
    /// A second `start` for the session already running is a no-op. A
    /// `start` for a different session first tears the previous channel
    /// down and clears the event log.
    pub async fn start(&mut self, session: SessionToken) -> Result<()> {
        if let Some(active) = &self.active {
            if active.session == session && !active.handle.is_finished() {
                debug!("start ignored, channel already active for this session");
                return Ok(());
            }
        }

        let switching = self.active.is_some();
        self.stop().await;
        if switching {
            self.log.clear();
        }

        let url = endpoint_url(&self.config.base_url, &session)?;
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let task = LinkTask::new(
            self.config.clone(),
            Arc::clone(&self.transport),
            url,
            self.log.clone(),
            self.celebrations.clone(),
            Arc::clone(&self.state),
            commands_rx,
            self.clock.clone(),
        );
        let handle = tokio::spawn(task.run());
        self.active = Some(ActiveLink {
            session,
            commands,
            handle,
        });
        Ok(())
    }

    /// Stop the push channel: close the socket, cancel any pending
    /// reconnect delay, return to `Idle`. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.commands.send(LinkCommand::Stop);
            let _ = active.handle.await;
        }
    }

    /// Send an outbound envelope; a silent no-op unless the channel is open
    pub fn send(&self, envelope: Envelope) {
        if *self.state_rx.borrow() != LinkState::Open {
            debug!("send ignored, push channel not open");
            return;
        }
        if let Some(active) = &self.active {
            let _ = active.commands.send(LinkCommand::Send(envelope));
        }
    }

    /// Watch receiver for connection state transitions
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// The connection state right now
    pub fn current_state(&self) -> LinkState {
        *self.state_rx.borrow()
    }

    /// Handle to the session's event log
    pub fn log(&self) -> SharedEventLog {
        self.log.clone()
    }

    /// Subscribe to every event appended from now on
    pub fn subscribe_events(&self) -> Subscription<PushEvent> {
        self.log.subscribe()
    }

    pub fn unsubscribe_events(&self, token: SubscriptionToken) {
        self.log.unsubscribe(token);
    }

    /// Subscribe to one-shot celebration signals
    pub fn subscribe_celebrations(&self) -> Subscription<CelebrationKind> {
        self.celebrations.subscribe()
    }

    pub fn unsubscribe_celebrations(&self, token: SubscriptionToken) {
        self.celebrations.unsubscribe(token);
    }

    /// Derive the current notification view from the tail of the log
    pub fn notifications(&self) -> Vec<Notification> {
        derive_notifications(&self.log.recent(self.config.notification_window))
    }
}

impl<C: TimeSource + Clone + Send + 'static> Drop for PushClient<C> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.commands.send(LinkCommand::Stop);
            active.handle.abort();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_new_client_is_idle_with_empty_log() {
        let client = PushClient::new(PushConfig::default()).unwrap();
        assert_eq!(client.current_state(), LinkState::Idle);
        assert!(client.log().is_empty());
        assert!(client.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_send_before_start_is_a_no_op() {
        let client = PushClient::new(PushConfig::default()).unwrap();
        client.send(Envelope::new("ping", json!({})));
        assert_eq!(client.current_state(), LinkState::Idle);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_idempotent() {
        let mut client = PushClient::new(PushConfig::default()).unwrap();
        client.stop().await;
        client.stop().await;
        assert_eq!(client.current_state(), LinkState::Idle);
    }
}
