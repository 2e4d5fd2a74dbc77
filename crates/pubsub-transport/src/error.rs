//! Error types for the transport.

use thiserror::Error;

/// Transport error type.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Message bus connection lost or refused. Publishes and subscribes
    /// fail fast; nothing is silently dropped or queued.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The transport was closed; no further traffic is possible.
    #[error("transport closed")]
    Closed,

    /// Redis protocol or connection error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload serialization error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
