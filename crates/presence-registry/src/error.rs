//! Error types for the presence layer.

use pubsub_transport::TransportError;
use thiserror::Error;

/// Presence error type.
#[derive(Error, Debug)]
pub enum PresenceError {
    /// Underlying bus failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Payload serialization error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for presence operations.
pub type PresenceResult<T> = Result<T, PresenceError>;
