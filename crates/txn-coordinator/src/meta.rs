//! Transaction token generation.

use crate::{TxnError, TxnResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation token shared by every op of one logical command.
///
/// Not itself transactional: each op still commits or fails independently.
/// The token only lets a subscriber count arrivals and infer completion or
/// partial failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMeta {
    /// Opaque key, unique per command.
    #[serde(rename = "transactionKey")]
    pub transaction_key: String,
    /// Number of ops the command fans out into, computed from the command
    /// payload before any op is submitted.
    #[serde(rename = "opCount")]
    pub op_count: u32,
}

impl TransactionMeta {
    /// Generate a fresh token for a command producing `op_count` ops.
    pub fn generate(op_count: u32) -> TxnResult<Self> {
        if op_count == 0 {
            return Err(TxnError::EmptyTransaction);
        }
        Ok(Self {
            transaction_key: format!("txn_{}", Uuid::new_v4().simple()),
            op_count,
        })
    }

    /// Token for a single-op command.
    pub fn single() -> Self {
        Self::generate(1).expect("op_count 1 is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_keys() {
        let a = TransactionMeta::generate(3).unwrap();
        let b = TransactionMeta::generate(3).unwrap();

        assert_ne!(a.transaction_key, b.transaction_key);
        assert!(a.transaction_key.starts_with("txn_"));
        assert_eq!(a.op_count, 3);
    }

    #[test]
    fn test_generate_zero_ops_rejected() {
        assert_eq!(
            TransactionMeta::generate(0),
            Err(TxnError::EmptyTransaction)
        );
    }

    #[test]
    fn test_wire_shape() {
        let meta = TransactionMeta {
            transaction_key: "txn_abc".to_string(),
            op_count: 4,
        };

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["transactionKey"], "txn_abc");
        assert_eq!(json["opCount"], 4);
    }
}
