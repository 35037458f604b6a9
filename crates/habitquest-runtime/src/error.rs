//! Error types for the push runtime

use habitquest_core::CoreError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors surfaced by the push connection runtime.
///
/// Only configuration problems reach callers; transport and decode
/// failures are absorbed by the connection task and show up as state
/// transitions or dropped frames.
#[derive(Debug, Error)]
pub enum PushError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid push endpoint `{url}`: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("failed to connect to push endpoint: {0}")]
    ConnectFailed(String),

    #[error("websocket protocol error: {0}")]
    WebSocket(String),
}

pub type Result<T> = core::result::Result<T, PushError>;
