//! Error types for the document store.

use crate::Collection;
use thiserror::Error;

/// Document store error type.
#[derive(Error, Debug)]
pub enum DocStoreError {
    /// Document missing or tombstoned.
    #[error("document {collection}/{id} not found")]
    NotFound {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
    },

    /// Create against an id that is already live (or tombstoned; ids are
    /// never recycled).
    #[error("document {collection}/{id} already exists")]
    AlreadyExists {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
    },

    /// The submitted base version is ahead of the document.
    #[error("version conflict: base {requested} is ahead of current {current}")]
    VersionConflict {
        /// Document's committed version.
        current: u64,
        /// Version the caller submitted against.
        requested: u64,
    },

    /// Operation cannot apply to the document snapshot (bad path, index out
    /// of bounds, wrong container type).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for document store operations.
pub type DocStoreResult<T> = Result<T, DocStoreError>;
