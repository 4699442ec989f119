//! # Record Store Errors

use thiserror::Error;

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be read
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write was refused
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
