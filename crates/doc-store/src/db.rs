//! SQLite persistence for documents and their op logs.

use crate::models::{CommittedOp, DocOp, DocState, DocumentRow};
use crate::{migrations, Collection, DocStoreError, DocStoreResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;
use txn_coordinator::TransactionMeta;

/// Database wrapper for the document store.
///
/// The connection is guarded by a mutex so the store can be shared across
/// tasks; per-document serialization happens a layer above, in the store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> DocStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> DocStoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Load a document's current fold, if any.
    pub fn load_document(
        &self,
        collection: Collection,
        doc_id: &str,
    ) -> DocStoreResult<Option<DocumentRow>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let row = conn
            .query_row(
                "SELECT version, state, snapshot FROM documents
                 WHERE collection = ?1 AND doc_id = ?2",
                params![collection.as_str(), doc_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((version, state, snapshot)) = row else {
            return Ok(None);
        };

        let state = DocState::parse(&state).ok_or_else(|| {
            DocStoreError::InvalidOperation(format!("unknown document state {state:?}"))
        })?;

        Ok(Some(DocumentRow {
            version: version as u64,
            state,
            snapshot: serde_json::from_str(&snapshot)?,
        }))
    }

    /// Load a document's committed ops with version greater than `since`.
    pub fn load_ops_since(
        &self,
        collection: Collection,
        doc_id: &str,
        since: u64,
    ) -> DocStoreResult<Vec<CommittedOp>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT version, op_json, txn_key, txn_op_count FROM doc_ops
             WHERE collection = ?1 AND doc_id = ?2 AND version > ?3
             ORDER BY version ASC",
        )?;

        let rows = stmt.query_map(
            params![collection.as_str(), doc_id, since as i64],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        )?;

        let mut ops = Vec::new();
        for row in rows {
            let (version, op_json, txn_key, txn_op_count) = row?;
            let op: DocOp = serde_json::from_str(&op_json)?;
            let txn = match (txn_key, txn_op_count) {
                (Some(key), Some(count)) => Some(TransactionMeta {
                    transaction_key: key,
                    op_count: count as u32,
                }),
                _ => None,
            };
            ops.push(CommittedOp {
                version: version as u64,
                op,
                txn,
            });
        }

        Ok(ops)
    }

    /// Persist one commit: the op log entry plus the updated fold, in a
    /// single SQLite transaction so a crash never splits them.
    pub fn commit_op(
        &self,
        collection: Collection,
        doc_id: &str,
        committed: &CommittedOp,
        state: DocState,
        snapshot: &serde_json::Value,
    ) -> DocStoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let op_json = serde_json::to_string(&committed.op)?;
        let snapshot_json = serde_json::to_string(snapshot)?;
        let (txn_key, txn_op_count) = match &committed.txn {
            Some(meta) => (Some(meta.transaction_key.as_str()), Some(meta.op_count as i64)),
            None => (None, None),
        };

        let mut conn = self.conn.lock().expect("database mutex poisoned");
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO doc_ops (collection, doc_id, version, op_json, txn_key, txn_op_count, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                collection.as_str(),
                doc_id,
                committed.version as i64,
                op_json,
                txn_key,
                txn_op_count,
                now,
            ],
        )?;

        tx.execute(
            "INSERT INTO documents (collection, doc_id, version, state, snapshot, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT (collection, doc_id) DO UPDATE SET
                 version = excluded.version,
                 state = excluded.state,
                 snapshot = excluded.snapshot,
                 updated_at = excluded.updated_at",
            params![
                collection.as_str(),
                doc_id,
                committed.version as i64,
                state.as_str(),
                snapshot_json,
                now,
            ],
        )?;

        tx.commit()?;

        debug!(
            collection = %collection,
            doc_id = %doc_id,
            version = committed.version,
            "Committed op"
        );

        Ok(())
    }
}
