//! The document store: versioned documents mutated only through ops.
//!
//! Each document serializes its own writers behind an async mutex; two ops
//! against different documents never block each other. An op submitted
//! against a stale version is transformed against every op committed since,
//! in commit order, before it applies. Every successful commit emits a
//! [`DocChange`] on the store's broadcast channel.

use crate::db::Database;
use crate::models::{CommittedOp, DocOp, DocState, DocumentRow};
use crate::op::{apply, Operation};
use crate::transform::{transform_op, Side};
use crate::{Collection, DocStoreError, DocStoreResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use txn_coordinator::TransactionMeta;

/// Buffered change events before lagging subscribers start missing them.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A committed change, published to live subscribers.
///
/// Carries the applied op (not necessarily the full snapshot); subscribers
/// re-fetch or fold the diff themselves.
#[derive(Debug, Clone)]
pub struct DocChange {
    /// Target collection.
    pub collection: Collection,
    /// Document id.
    pub id: String,
    /// Version produced by this change.
    pub version: u64,
    /// The committed op.
    pub op: DocOp,
    /// Transaction token, if part of a multi-op command.
    pub txn: Option<TransactionMeta>,
}

/// Result of a successful submit.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// The document's new version.
    pub new_version: u64,
    /// The op as actually applied, after transformation. Callers reconcile
    /// their local view from this, not from what they sent.
    pub applied_op: Operation,
}

/// A point-in-time read of a document.
#[derive(Debug, Clone)]
pub struct DocSnapshot {
    /// Committed version.
    pub version: u64,
    /// Snapshot data at `version`.
    pub data: Value,
    /// Lifecycle state.
    pub state: DocState,
}

/// In-memory state of one document.
struct DocEntry {
    /// None until the document is created (or when only a tombstone row
    /// would exist for a never-created id).
    state: Option<DocState>,
    version: u64,
    snapshot: Value,
    /// Full committed log, version order; `log[n]` produced version `n + 1`.
    log: Vec<CommittedOp>,
}

impl DocEntry {
    fn missing() -> Self {
        Self {
            state: None,
            version: 0,
            snapshot: Value::Null,
            log: Vec::new(),
        }
    }

    fn from_row(row: DocumentRow, log: Vec<CommittedOp>) -> Self {
        Self {
            state: Some(row.state),
            version: row.version,
            snapshot: row.snapshot,
            log,
        }
    }
}

/// Versioned OT document store.
pub struct DocStore {
    db: Arc<Database>,
    docs: Mutex<HashMap<(Collection, String), Arc<Mutex<DocEntry>>>>,
    changes: broadcast::Sender<DocChange>,
}

impl DocStore {
    /// Create a store over an open database.
    pub fn new(db: Arc<Database>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            db,
            docs: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Subscribe to committed changes across all documents.
    pub fn changes(&self) -> broadcast::Receiver<DocChange> {
        self.changes.subscribe()
    }

    /// Create a document with an initial snapshot.
    ///
    /// Fails with `AlreadyExists` if the id is live or tombstoned; ids are
    /// never recycled.
    pub async fn create(
        &self,
        collection: Collection,
        id: &str,
        snapshot: Value,
        txn: Option<TransactionMeta>,
    ) -> DocStoreResult<u64> {
        let entry = self.entry(collection, id).await?;
        let mut doc = entry.lock().await;

        if doc.state.is_some() {
            return Err(DocStoreError::AlreadyExists {
                collection,
                id: id.to_string(),
            });
        }

        let committed = CommittedOp {
            version: 1,
            op: DocOp::Create {
                snapshot: snapshot.clone(),
            },
            txn: txn.clone(),
        };
        self.db
            .commit_op(collection, id, &committed, DocState::Active, &snapshot)?;

        doc.state = Some(DocState::Active);
        doc.version = 1;
        doc.snapshot = snapshot;
        doc.log.push(committed.clone());

        info!(collection = %collection, id = %id, "Created document");
        self.emit(collection, id, &committed);

        Ok(1)
    }

    /// Submit an edit op against `base_version`.
    ///
    /// If `base_version` is behind the document, the op is transformed
    /// against every op committed since, in commit order. The returned
    /// outcome carries the op as applied so the caller can reconcile.
    pub async fn submit(
        &self,
        collection: Collection,
        id: &str,
        base_version: u64,
        op: Operation,
        txn: Option<TransactionMeta>,
    ) -> DocStoreResult<SubmitOutcome> {
        let entry = self.entry(collection, id).await?;
        let mut doc = entry.lock().await;

        match doc.state {
            Some(DocState::Active) => {}
            Some(DocState::Deleted) | None => {
                return Err(DocStoreError::NotFound {
                    collection,
                    id: id.to_string(),
                });
            }
        }

        if base_version > doc.version {
            return Err(DocStoreError::VersionConflict {
                current: doc.version,
                requested: base_version,
            });
        }

        // Rebase over everything committed since the caller's base.
        let mut applied = op;
        for committed in &doc.log[base_version as usize..] {
            if let DocOp::Edit { op: their } = &committed.op {
                applied = transform_op(&applied, their, Side::Right);
            }
        }

        // All-or-nothing: apply to a scratch fold, commit only on success.
        let next_snapshot = apply(&doc.snapshot, &applied)?;
        let new_version = doc.version + 1;

        let committed = CommittedOp {
            version: new_version,
            op: DocOp::Edit {
                op: applied.clone(),
            },
            txn,
        };
        self.db
            .commit_op(collection, id, &committed, DocState::Active, &next_snapshot)?;

        doc.version = new_version;
        doc.snapshot = next_snapshot;
        doc.log.push(committed.clone());

        debug!(
            collection = %collection,
            id = %id,
            version = new_version,
            rebased_from = base_version,
            "Applied op"
        );
        self.emit(collection, id, &committed);

        Ok(SubmitOutcome {
            new_version,
            applied_op: applied,
        })
    }

    /// Tombstone a document.
    ///
    /// The tombstone is itself an op: late concurrent ops against the
    /// deleted document fail with `NotFound` instead of resurrecting data.
    pub async fn delete(
        &self,
        collection: Collection,
        id: &str,
        base_version: u64,
        txn: Option<TransactionMeta>,
    ) -> DocStoreResult<u64> {
        let entry = self.entry(collection, id).await?;
        let mut doc = entry.lock().await;

        match doc.state {
            Some(DocState::Active) => {}
            Some(DocState::Deleted) | None => {
                return Err(DocStoreError::NotFound {
                    collection,
                    id: id.to_string(),
                });
            }
        }

        if base_version > doc.version {
            return Err(DocStoreError::VersionConflict {
                current: doc.version,
                requested: base_version,
            });
        }

        let new_version = doc.version + 1;
        let committed = CommittedOp {
            version: new_version,
            op: DocOp::Delete,
            txn,
        };
        self.db
            .commit_op(collection, id, &committed, DocState::Deleted, &doc.snapshot)?;

        doc.state = Some(DocState::Deleted);
        doc.version = new_version;
        doc.log.push(committed.clone());

        info!(collection = %collection, id = %id, version = new_version, "Deleted document");
        self.emit(collection, id, &committed);

        Ok(new_version)
    }

    /// Read a document's current snapshot.
    ///
    /// Tombstoned documents are still readable for audit; never-created ids
    /// are `NotFound`.
    pub async fn fetch(&self, collection: Collection, id: &str) -> DocStoreResult<DocSnapshot> {
        let entry = self.entry(collection, id).await?;
        let doc = entry.lock().await;

        match doc.state {
            Some(state) => Ok(DocSnapshot {
                version: doc.version,
                data: doc.snapshot.clone(),
                state,
            }),
            None => Err(DocStoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    /// Committed ops with version greater than `since`, for diff catch-up.
    pub async fn ops_since(
        &self,
        collection: Collection,
        id: &str,
        since: u64,
    ) -> DocStoreResult<Vec<CommittedOp>> {
        let entry = self.entry(collection, id).await?;
        let doc = entry.lock().await;

        if doc.state.is_none() {
            return Err(DocStoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }

        Ok(doc.log[(since as usize).min(doc.log.len())..].to_vec())
    }

    /// Get or rehydrate the in-memory entry for a document.
    async fn entry(
        &self,
        collection: Collection,
        id: &str,
    ) -> DocStoreResult<Arc<Mutex<DocEntry>>> {
        let mut docs = self.docs.lock().await;
        if let Some(entry) = docs.get(&(collection, id.to_string())) {
            return Ok(entry.clone());
        }

        let entry = match self.db.load_document(collection, id)? {
            Some(row) => {
                let log = self.db.load_ops_since(collection, id, 0)?;
                debug!(collection = %collection, id = %id, version = row.version, "Rehydrated document");
                DocEntry::from_row(row, log)
            }
            None => DocEntry::missing(),
        };

        let entry = Arc::new(Mutex::new(entry));
        docs.insert((collection, id.to_string()), entry.clone());
        Ok(entry)
    }

    fn emit(&self, collection: Collection, id: &str, committed: &CommittedOp) {
        // No subscribers is fine
        let _ = self.changes.send(DocChange {
            collection,
            id: id.to_string(),
            version: committed.version,
            op: committed.op.clone(),
            txn: committed.txn.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::{Edit, PathSeg};
    use serde_json::json;

    fn store() -> DocStore {
        DocStore::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn name_replace(prior: &str, value: &str) -> Operation {
        Operation::single(Edit::replace(
            vec![PathSeg::key("name")],
            json!(prior),
            json!(value),
        ))
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let store = store();

        let version = store
            .create(Collection::Table, "tbl1", json!({ "name": "tasks" }), None)
            .await
            .unwrap();
        assert_eq!(version, 1);

        let snap = store.fetch(Collection::Table, "tbl1").await.unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.data, json!({ "name": "tasks" }));
        assert_eq!(snap.state, DocState::Active);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = store();
        store
            .create(Collection::Table, "tbl1", json!({}), None)
            .await
            .unwrap();

        let err = store
            .create(Collection::Table, "tbl1", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocStoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_submit_bumps_version_monotonically() {
        let store = store();
        store
            .create(Collection::Table, "tbl1", json!({ "name": "v0" }), None)
            .await
            .unwrap();

        for n in 1..=5u64 {
            let outcome = store
                .submit(
                    Collection::Table,
                    "tbl1",
                    n,
                    name_replace(&format!("v{}", n - 1), &format!("v{n}")),
                    None,
                )
                .await
                .unwrap();
            assert_eq!(outcome.new_version, n + 1);
        }

        let snap = store.fetch(Collection::Table, "tbl1").await.unwrap();
        // creation version + N submits, no gaps
        assert_eq!(snap.version, 6);
        assert_eq!(snap.data["name"], json!("v5"));
    }

    #[tokio::test]
    async fn test_stale_submit_is_transformed() {
        let store = store();
        store
            .create(
                Collection::Field,
                "fieldlist",
                json!({ "fields": [
                    { "name": "created" },
                    { "name": "status" },
                    { "name": "X" },
                ]}),
                None,
            )
            .await
            .unwrap();

        // A renames the field at index 2 (commits at v2)
        store
            .submit(
                Collection::Field,
                "fieldlist",
                1,
                Operation::single(Edit::replace(
                    vec![PathSeg::key("fields"), PathSeg::idx(2), PathSeg::key("name")],
                    json!("X"),
                    json!("Y"),
                )),
                None,
            )
            .await
            .unwrap();

        // B, still at v1, concurrently inserts at index 2
        let outcome = store
            .submit(
                Collection::Field,
                "fieldlist",
                1,
                Operation::single(Edit::insert(
                    vec![PathSeg::key("fields"), PathSeg::idx(2)],
                    json!({ "name": "Z" }),
                )),
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome.new_version, 3);

        let snap = store.fetch(Collection::Field, "fieldlist").await.unwrap();
        // both edits landed: Y renamed in its original slot, Z inserted
        assert_eq!(snap.data["fields"][2]["name"], json!("Z"));
        assert_eq!(snap.data["fields"][3]["name"], json!("Y"));
    }

    #[tokio::test]
    async fn test_base_version_ahead_is_conflict() {
        let store = store();
        store
            .create(Collection::Table, "tbl1", json!({ "name": "t" }), None)
            .await
            .unwrap();

        let err = store
            .submit(Collection::Table, "tbl1", 9, name_replace("t", "u"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocStoreError::VersionConflict { current: 1, requested: 9 }
        ));
    }

    #[tokio::test]
    async fn test_delete_tombstones_and_rejects_late_ops() {
        let store = store();
        store
            .create(Collection::Record, "rec1", json!({ "title": "a" }), None)
            .await
            .unwrap();

        let version = store
            .delete(Collection::Record, "rec1", 1, None)
            .await
            .unwrap();
        assert_eq!(version, 2);

        // late concurrent op fails deterministically
        let err = store
            .submit(
                Collection::Record,
                "rec1",
                1,
                Operation::single(Edit::replace(
                    vec![PathSeg::key("title")],
                    json!("a"),
                    json!("b"),
                )),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocStoreError::NotFound { .. }));

        // still queryable for audit
        let snap = store.fetch(Collection::Record, "rec1").await.unwrap();
        assert_eq!(snap.state, DocState::Deleted);
        assert_eq!(snap.data["title"], json!("a"));

        // create on the tombstoned id stays rejected
        let err = store
            .create(Collection::Record, "rec1", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocStoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_never_created_id_not_found() {
        let store = store();

        let err = store.fetch(Collection::View, "nope").await.unwrap_err();
        assert!(matches!(err, DocStoreError::NotFound { .. }));

        let err = store
            .submit(Collection::View, "nope", 1, name_replace("a", "b"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocStoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rejected_op_applies_nothing() {
        let store = store();
        store
            .create(Collection::Table, "tbl1", json!({ "fields": ["a"] }), None)
            .await
            .unwrap();

        // second edit is out of bounds; the whole op must be rejected
        let op = Operation::new(vec![
            Edit::insert(vec![PathSeg::key("fields"), PathSeg::idx(1)], json!("b")),
            Edit::delete(vec![PathSeg::key("fields"), PathSeg::idx(9)], json!("?")),
        ]);
        assert!(store
            .submit(Collection::Table, "tbl1", 1, op, None)
            .await
            .is_err());

        let snap = store.fetch(Collection::Table, "tbl1").await.unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.data["fields"], json!(["a"]));
    }

    #[tokio::test]
    async fn test_ops_since_returns_diff() {
        let store = store();
        store
            .create(Collection::Table, "tbl1", json!({ "name": "a" }), None)
            .await
            .unwrap();
        store
            .submit(Collection::Table, "tbl1", 1, name_replace("a", "b"), None)
            .await
            .unwrap();
        store
            .submit(Collection::Table, "tbl1", 2, name_replace("b", "c"), None)
            .await
            .unwrap();

        let ops = store.ops_since(Collection::Table, "tbl1", 1).await.unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].version, 2);
        assert_eq!(ops[1].version, 3);
    }

    #[tokio::test]
    async fn test_change_events_emitted_in_commit_order() {
        let store = store();
        let mut changes = store.changes();

        store
            .create(Collection::Table, "tbl1", json!({ "name": "a" }), None)
            .await
            .unwrap();
        store
            .submit(Collection::Table, "tbl1", 1, name_replace("a", "b"), None)
            .await
            .unwrap();
        store.delete(Collection::Table, "tbl1", 2, None).await.unwrap();

        let first = changes.recv().await.unwrap();
        assert_eq!(first.version, 1);
        assert!(matches!(first.op, DocOp::Create { .. }));

        let second = changes.recv().await.unwrap();
        assert_eq!(second.version, 2);
        assert!(matches!(second.op, DocOp::Edit { .. }));

        let third = changes.recv().await.unwrap();
        assert_eq!(third.version, 3);
        assert!(matches!(third.op, DocOp::Delete));
    }

    #[tokio::test]
    async fn test_txn_meta_flows_through_changes() {
        let store = store();
        let mut changes = store.changes();
        let meta = TransactionMeta {
            transaction_key: "txn_k".to_string(),
            op_count: 2,
        };

        store
            .create(Collection::Table, "tbl1", json!({}), Some(meta.clone()))
            .await
            .unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.txn, Some(meta));
    }

    #[tokio::test]
    async fn test_concurrent_submitters_no_gaps() {
        let store = Arc::new(store());
        store
            .create(Collection::Record, "rec1", json!({ "cells": {} }), None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                // every writer submits against a stale base on purpose
                store
                    .submit(
                        Collection::Record,
                        "rec1",
                        1,
                        Operation::single(Edit::replace(
                            vec![PathSeg::key("cells"), PathSeg::key(format!("f{worker}"))],
                            Value::Null,
                            json!(worker),
                        )),
                        None,
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snap = store.fetch(Collection::Record, "rec1").await.unwrap();
        // 1 create + 8 submits, serialized per document
        assert_eq!(snap.version, 9);
        assert_eq!(snap.data["cells"].as_object().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_rehydration_from_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.sqlite");

        {
            let store = DocStore::new(Arc::new(Database::open(&path).unwrap()));
            store
                .create(Collection::Table, "tbl1", json!({ "name": "a" }), None)
                .await
                .unwrap();
            store
                .submit(Collection::Table, "tbl1", 1, name_replace("a", "b"), None)
                .await
                .unwrap();
        }

        // a fresh store over the same file sees the committed state
        let store = DocStore::new(Arc::new(Database::open(&path).unwrap()));
        let snap = store.fetch(Collection::Table, "tbl1").await.unwrap();
        assert_eq!(snap.version, 2);
        assert_eq!(snap.data["name"], json!("b"));

        // and can keep submitting against it
        let outcome = store
            .submit(Collection::Table, "tbl1", 2, name_replace("b", "c"), None)
            .await
            .unwrap();
        assert_eq!(outcome.new_version, 3);
    }
}
