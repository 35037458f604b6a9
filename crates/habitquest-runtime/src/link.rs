//! Connection state machine and the task that drives it.
//!
//! One task owns the transport socket for the lifetime of a session and
//! is the only writer to the event log. Every await point also selects
//! on the command channel, so a stop request cancels an in-flight
//! connect, an open read loop, or an armed reconnect delay without
//! leaving a timer behind.

use std::fmt;
use std::sync::{Arc, Mutex};

use habitquest_core::{
    CelebrationKind, CelebrationTracker, Envelope, EventKind, SessionToken, TimeSource,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PushConfig;
use crate::error::{PushError, Result};
use crate::shared_log::{SharedEventLog, SignalFanout, Subscription, SubscriptionToken};
use crate::transport::{Frame, PushSocket, PushTransport};

// ----------------------------------------------------------------------------
// Link State
// ----------------------------------------------------------------------------

/// Logical state of the push channel.
///
/// `Idle` is both the initial state (no session) and the state after an
/// explicit stop. `Reconnecting` is entered from a failed connect or a
/// dropped socket while the session is still active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Open,
    Closing,
    Reconnecting,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Commands and Endpoint
// ----------------------------------------------------------------------------

/// Commands from the client handle to the connection task
#[derive(Debug)]
pub(crate) enum LinkCommand {
    Send(Envelope),
    Stop,
}

/// Build the handshake URL: `{base}/ws?token=<credential>`.
///
/// The credential travels only in the query parameter; it is never
/// logged or stored here.
pub(crate) fn endpoint_url(base_url: &str, session: &SessionToken) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|e| PushError::InvalidEndpoint {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(PushError::InvalidEndpoint {
                url: base_url.to_string(),
                reason: format!("unsupported scheme `{other}`"),
            })
        }
    }
    url.set_path("/ws");
    url.query_pairs_mut()
        .clear()
        .append_pair("token", session.expose());
    Ok(url)
}

// ----------------------------------------------------------------------------
// Celebration Hub
// ----------------------------------------------------------------------------

/// Fan-out point for one-shot celebration signals
#[derive(Clone)]
pub(crate) struct CelebrationHub {
    inner: Arc<Mutex<SignalFanout<CelebrationKind>>>,
}

impl CelebrationHub {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalFanout::new())),
        }
    }

    pub(crate) fn subscribe(&self) -> Subscription<CelebrationKind> {
        self.inner.lock().expect("celebration lock").subscribe()
    }

    pub(crate) fn unsubscribe(&self, token: SubscriptionToken) {
        self.inner.lock().expect("celebration lock").unsubscribe(token)
    }

    fn emit(&self, kind: CelebrationKind) {
        self.inner.lock().expect("celebration lock").emit(&kind)
    }
}

// ----------------------------------------------------------------------------
// Link Task
// ----------------------------------------------------------------------------

/// The per-session connection task: connect, read, reconnect.
pub(crate) struct LinkTask<C: TimeSource> {
    config: PushConfig,
    transport: Arc<dyn PushTransport>,
    url: Url,
    log: SharedEventLog,
    tracker: CelebrationTracker,
    celebrations: CelebrationHub,
    state: Arc<watch::Sender<LinkState>>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    clock: C,
    /// Attempts since the last successful open. Tracked for diagnostics;
    /// the delay stays fixed regardless.
    retry_count: u32,
}

enum Step<T> {
    Ready(T),
    Command(Option<LinkCommand>),
}

impl<C: TimeSource> LinkTask<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: PushConfig,
        transport: Arc<dyn PushTransport>,
        url: Url,
        log: SharedEventLog,
        celebrations: CelebrationHub,
        state: Arc<watch::Sender<LinkState>>,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
        clock: C,
    ) -> Self {
        let tracker = CelebrationTracker::new(config.celebration_cooldown);
        Self {
            config,
            transport,
            url,
            log,
            tracker,
            celebrations,
            state,
            commands,
            clock,
            retry_count: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        'session: loop {
            self.set_state(LinkState::Connecting);

            let connected = {
                let connect = self.transport.connect(&self.url);
                tokio::pin!(connect);
                loop {
                    let step = tokio::select! {
                        result = &mut connect => Step::Ready(result),
                        command = self.commands.recv() => Step::Command(command),
                    };
                    match step {
                        Step::Ready(result) => break Some(result),
                        // Not open yet: sends are silent no-ops
                        Step::Command(Some(LinkCommand::Send(_))) => {}
                        Step::Command(Some(LinkCommand::Stop)) | Step::Command(None) => {
                            break None
                        }
                    }
                }
            };

            match connected {
                None => {
                    self.set_state(LinkState::Closing);
                    break 'session;
                }
                Some(Ok(socket)) => {
                    if !self.drive_open(socket).await {
                        break 'session;
                    }
                }
                Some(Err(error)) => {
                    warn!(%error, "push connect failed");
                }
            }

            // Socket lost or connect failed with the session still active:
            // schedule a fixed-delay retry.
            self.retry_count += 1;
            self.set_state(LinkState::Reconnecting);
            debug!(
                retry = self.retry_count,
                delay_ms = self.config.reconnect_delay.as_millis() as u64,
                "reconnect scheduled"
            );

            let delay = tokio::time::sleep(self.config.reconnect_delay);
            tokio::pin!(delay);
            loop {
                let step = tokio::select! {
                    _ = &mut delay => Step::Ready(()),
                    command = self.commands.recv() => Step::Command(command),
                };
                match step {
                    Step::Ready(()) => continue 'session,
                    Step::Command(Some(LinkCommand::Send(_))) => {}
                    Step::Command(Some(LinkCommand::Stop)) | Step::Command(None) => {
                        self.set_state(LinkState::Closing);
                        break 'session;
                    }
                }
            }
        }

        self.set_state(LinkState::Idle);
    }

    /// Read loop while the socket is open.
    ///
    /// Returns `true` if the socket was lost and the session should
    /// reconnect, `false` on an explicit stop.
    async fn drive_open(&mut self, mut socket: Box<dyn PushSocket>) -> bool {
        self.retry_count = 0;
        self.set_state(LinkState::Open);
        info!("push channel open");

        loop {
            let step = tokio::select! {
                frame = socket.next_frame() => Step::Ready(frame),
                command = self.commands.recv() => Step::Command(command),
            };
            match step {
                Step::Ready(Some(Frame::Text(text))) => self.handle_text(&text),
                Step::Ready(Some(Frame::Binary(_))) => {
                    debug!("ignoring binary frame");
                }
                Step::Ready(None) => {
                    warn!("push channel closed by peer");
                    return true;
                }
                Step::Command(Some(LinkCommand::Send(envelope))) => {
                    forward(socket.as_mut(), envelope).await;
                }
                Step::Command(Some(LinkCommand::Stop)) | Step::Command(None) => {
                    self.set_state(LinkState::Closing);
                    socket.close().await;
                    return false;
                }
            }
        }
    }

    /// Decode one inbound text frame, append it, and raise any trigger.
    ///
    /// A frame that fails to decode is dropped here: it never reaches the
    /// event log and never disturbs connection state.
    fn handle_text(&mut self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(error) => {
                debug!(%error, "dropping malformed push message");
                return;
            }
        };

        let now = self.clock.now();
        let event = self
            .log
            .append(EventKind::from_tag(&envelope.kind), envelope.data, now);
        if let Some(kind) = self.tracker.observe(&event, now) {
            info!(?kind, sequence = event.sequence, "celebration trigger");
            self.celebrations.emit(kind);
        }
    }

    fn set_state(&self, next: LinkState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "link state transition");
            *state = next;
            true
        });
    }
}

/// Send an outbound envelope, absorbing encode and transport failures
async fn forward(socket: &mut dyn PushSocket, envelope: Envelope) {
    match envelope.encode() {
        Ok(text) => {
            if let Err(error) = socket.send_text(&text).await {
                debug!(%error, "outbound send failed, message dropped");
            }
        }
        Err(error) => {
            debug!(%error, "failed to encode outbound message");
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SessionToken {
        SessionToken::new("tok-123").unwrap()
    }

    #[test]
    fn test_endpoint_url_embeds_path_and_token() {
        let url = endpoint_url("ws://localhost:8000", &token()).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws?token=tok-123");
    }

    #[test]
    fn test_endpoint_url_replaces_existing_query() {
        let url = endpoint_url("wss://push.example.com?stale=1", &token()).unwrap();
        assert_eq!(url.as_str(), "wss://push.example.com/ws?token=tok-123");
    }

    #[test]
    fn test_endpoint_url_rejects_non_websocket_schemes() {
        assert!(matches!(
            endpoint_url("http://localhost:8000", &token()),
            Err(PushError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            endpoint_url("not a url", &token()),
            Err(PushError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_link_state_display_names() {
        assert_eq!(LinkState::Idle.to_string(), "idle");
        assert_eq!(LinkState::Reconnecting.to_string(), "reconnecting");
    }
}
