//! Runtime error taxonomy for the control link and client commands.
//!
//! None of these ever cross the client boundary: the bridge engine turns
//! them into connection-state transitions or logged no-ops.

use thiserror::Error;

/// Establishing a session with the control server failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// TCP or WebSocket level failure.
    #[error("network failure connecting to {url}: {detail}")]
    Network { url: String, detail: String },
    /// The server rejected the supplied password.
    #[error("authentication rejected by {url}")]
    Auth { url: String },
    /// The server spoke something other than the expected handshake.
    #[error("handshake with {url} failed: {detail}")]
    Handshake { url: String, detail: String },
    /// No session within the configured bound.
    #[error("connect timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A call on an established link failed.
#[derive(Debug, Error)]
pub enum CallError {
    /// The underlying transport errored mid-call.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server closed the session.
    #[error("link closed by server")]
    Closed,
    /// The call did not complete within the configured bound.
    #[error("{request} timed out after {after:?}")]
    Timeout {
        request: &'static str,
        after: std::time::Duration,
    },
    /// The server answered but refused the request.
    #[error("{request} rejected (code {code}): {comment}")]
    Rejected {
        request: String,
        code: u16,
        comment: String,
    },
    /// The response could not be understood.
    #[error("malformed response to {request}: {detail}")]
    Protocol { request: String, detail: String },
}

/// A client-issued command could not be applied.
///
/// Always dropped by the caller; the next poll reasserts the true state.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("control link is not connected")]
    NotConnected,
    #[error("invalid command value: {0}")]
    InvalidValue(String),
    #[error(transparent)]
    Call(#[from] CallError),
}
