//! Database migrations for the document store.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::DocStoreResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DocStoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_documents_and_ops(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DocStoreResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: documents (current fold) and the append-only op log.
fn migrate_v1_documents_and_ops(conn: &Connection) -> DocStoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE documents (
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            state TEXT NOT NULL,
            snapshot TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, doc_id)
        );

        CREATE TABLE doc_ops (
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            op_json TEXT NOT NULL,
            txn_key TEXT,
            txn_op_count INTEGER,
            committed_at TEXT NOT NULL,
            PRIMARY KEY (collection, doc_id, version)
        );

        CREATE INDEX idx_doc_ops_txn_key ON doc_ops (txn_key)
            WHERE txn_key IS NOT NULL;
        ",
    )?;

    record_migration(conn, 1, "documents_and_ops")
}
