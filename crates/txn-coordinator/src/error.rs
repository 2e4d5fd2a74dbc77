//! Error types for transaction tracking.

use thiserror::Error;

/// Transaction tracking error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxnError {
    /// Fewer than `op_count` ops arrived before the caller's deadline.
    #[error("partial transaction {key}: {seen} of {expected} ops arrived")]
    PartialTransaction {
        /// Transaction key.
        key: String,
        /// Ops observed so far.
        seen: u32,
        /// Ops the command declared.
        expected: u32,
    },

    /// More ops arrived under one key than the command declared.
    #[error("transaction {key} already complete at {expected} ops, extra op observed")]
    TooManyOps {
        /// Transaction key.
        key: String,
        /// Ops the command declared.
        expected: u32,
    },

    /// Two ops under the same key declared different op counts.
    #[error("transaction {key} op_count mismatch: {first} then {second}")]
    OpCountMismatch {
        /// Transaction key.
        key: String,
        /// Count declared by the first observed op.
        first: u32,
        /// Conflicting count.
        second: u32,
    },

    /// A transaction must declare at least one op.
    #[error("op_count must be at least 1")]
    EmptyTransaction,
}

/// Result type for transaction operations.
pub type TxnResult<T> = Result<T, TxnError>;
