//! Row models for the document store.

use crate::op::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use txn_coordinator::TransactionMeta;

/// Lifecycle state of a document.
///
/// `NonExistent` is represented by the absence of a row; a document only
/// ever moves `NonExistent -> Active -> Deleted`, and `Deleted` is terminal
/// for edits (still queryable for audit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocState {
    /// Live and accepting ops.
    Active,
    /// Tombstoned; late ops fail deterministically.
    Deleted,
}

impl DocState {
    /// Stable storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocState::Active => "active",
            DocState::Deleted => "deleted",
        }
    }

    /// Parse the storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(DocState::Active),
            "deleted" => Some(DocState::Deleted),
            _ => None,
        }
    }
}

/// One entry of a document's persisted mutation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DocOp {
    /// Document creation with its initial snapshot.
    Create {
        /// Initial snapshot.
        snapshot: Value,
    },
    /// A transformed-and-applied edit operation.
    Edit {
        /// The applied operation (post-transform).
        op: Operation,
    },
    /// Tombstone.
    Delete,
}

/// A committed op with its version and transaction correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedOp {
    /// Version this op produced.
    pub version: u64,
    /// The op payload.
    pub op: DocOp,
    /// Transaction token, if the op belonged to a multi-op command.
    pub txn: Option<TransactionMeta>,
}

/// Current fold of a document as stored.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    /// Committed version.
    pub version: u64,
    /// Lifecycle state.
    pub state: DocState,
    /// Snapshot at `version`.
    pub snapshot: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{Edit, PathSeg};
    use serde_json::json;

    #[test]
    fn test_doc_state_round_trip() {
        assert_eq!(DocState::parse("active"), Some(DocState::Active));
        assert_eq!(DocState::parse("deleted"), Some(DocState::Deleted));
        assert_eq!(DocState::parse("gone"), None);
        assert_eq!(DocState::Active.as_str(), "active");
    }

    #[test]
    fn test_doc_op_serde_round_trip() {
        let ops = vec![
            DocOp::Create { snapshot: json!({ "name": "tasks" }) },
            DocOp::Edit {
                op: Operation::single(Edit::replace(
                    vec![PathSeg::key("name")],
                    json!("tasks"),
                    json!("sprint"),
                )),
            },
            DocOp::Delete,
        ];

        for op in ops {
            let json = serde_json::to_string(&op).unwrap();
            let back: DocOp = serde_json::from_str(&json).unwrap();
            assert_eq!(back, op);
        }
    }
}
