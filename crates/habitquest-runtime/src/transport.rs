//! Transport seam between the connection manager and the wire.
//!
//! The connection task only ever talks to [`PushTransport`] and
//! [`PushSocket`], so integration tests can drive the state machine with
//! a scripted in-memory transport while production uses the
//! `tokio-tungstenite` WebSocket implementation.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::error::{PushError, Result};

// ----------------------------------------------------------------------------
// Transport Traits
// ----------------------------------------------------------------------------

/// One inbound frame from the push socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// An established bidirectional push socket
#[async_trait]
pub trait PushSocket: Send {
    /// Next inbound frame; `None` means the socket closed or errored
    async fn next_frame(&mut self) -> Option<Frame>;

    /// Send one text frame
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Close the socket, absorbing any close-time errors
    async fn close(&mut self);
}

/// Factory for push sockets
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Box<dyn PushSocket>>;
}

// ----------------------------------------------------------------------------
// WebSocket Transport
// ----------------------------------------------------------------------------

/// Production transport over `tokio-tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn PushSocket>> {
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| PushError::ConnectFailed(e.to_string()))?;
        Ok(Box::new(WebSocketPushSocket { inner: stream }))
    }
}

struct WebSocketPushSocket {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushSocket for WebSocketPushSocket {
    async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Frame::Text(text)),
                Ok(Message::Binary(bytes)) => return Some(Frame::Binary(bytes)),
                // Control frames are handled by tungstenite; skip them
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(error) => {
                    debug!(%error, "websocket read error, treating as closed");
                    return None;
                }
            }
        }
    }

    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| PushError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(error) = self.inner.close(None).await {
            debug!(%error, "error closing websocket");
        }
    }
}
