//! Error types for command translation.

use thiserror::Error;
use txn_coordinator::TxnError;

/// Op builder error type.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// The command fans out into zero ops (e.g. an empty record batch).
    #[error("command produces no ops")]
    EmptyCommand,

    /// Neighbor order keys do not bracket an insertable gap.
    #[error("invalid order bounds: prev {prev:?} must be less than next {next:?}")]
    InvalidOrderBounds {
        /// Lower neighbor, if any.
        prev: Option<f64>,
        /// Upper neighbor, if any.
        next: Option<f64>,
    },

    /// A snapshot payload is not the JSON shape the command requires.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Transaction token generation failed.
    #[error("transaction error: {0}")]
    Txn(#[from] TxnError),
}

/// Result type for op building.
pub type BuilderResult<T> = Result<T, BuilderError>;
