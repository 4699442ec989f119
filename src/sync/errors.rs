//! # Sync Errors
//!
//! Error types for the streaming sync core.

use thiserror::Error;

use crate::records::StoreError;

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync errors
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    // ==================
    // Session Errors
    // ==================
    /// The stream request carried no token
    #[error("Missing {0}")]
    MissingToken(&'static str),

    /// The token was never staged or its staged filter expired.
    /// The two causes are deliberately indistinguishable.
    #[error("Expired or unknown request id")]
    SessionRejected,

    // ==================
    // Request Errors
    // ==================
    /// Filter payload could not be decoded
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Window request out of range
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    // ==================
    // Stream Errors
    // ==================
    /// The record store failed during a recomputation; fatal to the stream
    #[error("Recomputation failed: {0}")]
    RecomputeFailed(String),

    /// A result could not be encoded for the wire
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::MissingToken(_) => 403,
            SyncError::SessionRejected => 403,
            SyncError::InvalidFilter(_) => 400,
            SyncError::InvalidWindow(_) => 400,
            SyncError::RecomputeFailed(_) => 500,
            SyncError::Serialization(_) => 500,
            SyncError::Internal(_) => 500,
        }
    }

    /// True for errors the client answers by re-staging its filter
    pub fn is_session_rejection(&self) -> bool {
        matches!(self, SyncError::MissingToken(_) | SyncError::SessionRejected)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        SyncError::RecomputeFailed(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}
