//! # Client Errors

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client errors
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The server refused the stream token (HTTP 403)
    #[error("Session rejected: {0}")]
    SessionRejected(String),

    /// Staging the filter failed
    #[error("Staging failed: {0}")]
    Staging(String),

    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The server ended an event stream
    #[error("Stream closed by server")]
    StreamClosed,
}

impl ClientError {
    /// True for errors answered by re-staging the filter
    pub fn is_session_rejection(&self) -> bool {
        matches!(self, ClientError::SessionRejected(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}
