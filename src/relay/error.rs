use thiserror::Error;

use super::transport::TransportError;

/// Errors that end a pump or the relay as a whole.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// Transport-level failure on one of the two channels
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// An event of a known type carried an unusable payload
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
