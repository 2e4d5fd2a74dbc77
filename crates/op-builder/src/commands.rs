//! The closed set of domain commands.
//!
//! Each command carries typed ids, the base versions of the documents it
//! touches (the caller's current known state), and opaque JSON snapshot
//! payloads. The builder's translation is an exhaustive match over this
//! enum; there is no runtime shape probing.

use crate::ordering::OrderBetween;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot payload for a new document, keyed by its future id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDoc {
    /// Document id.
    pub id: String,
    /// Initial snapshot (opaque to the core).
    pub data: Value,
}

impl NewDoc {
    /// Snapshot with an id.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// A document the command edits, addressed at its known version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocRef {
    /// Document id.
    pub id: String,
    /// Version the caller last saw.
    pub version: u64,
}

impl DocRef {
    /// Reference a document at a version.
    pub fn at(id: impl Into<String>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

/// Every command the grid editor issues against the sync core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainCommand {
    /// Create a table with its initial fields, views, and records.
    CreateTable {
        /// Table document.
        table: NewDoc,
        /// Field documents, in display order.
        fields: Vec<NewDoc>,
        /// View documents, in display order.
        views: Vec<NewDoc>,
        /// Seed records.
        records: Vec<NewDoc>,
    },
    /// Tombstone a table and everything under it.
    DeleteTable {
        /// Table document.
        table: DocRef,
        /// Its field documents.
        fields: Vec<DocRef>,
        /// Its view documents.
        views: Vec<DocRef>,
        /// Its record documents.
        records: Vec<DocRef>,
    },
    /// Rename a table.
    RenameTable {
        /// Table document.
        table: DocRef,
        /// Current name.
        prior: Value,
        /// New name.
        name: String,
    },
    /// Set one top-level key of the table snapshot (icon, description, …).
    UpdateTableMeta {
        /// Table document.
        table: DocRef,
        /// Snapshot key.
        key: String,
        /// Current value.
        prior: Value,
        /// New value.
        value: Value,
    },

    /// Add a field between two siblings.
    AddField {
        /// Field document.
        field: NewDoc,
        /// Neighbor order keys.
        between: OrderBetween,
    },
    /// Tombstone a field.
    DeleteField {
        /// Field document.
        field: DocRef,
    },
    /// Rename a field.
    RenameField {
        /// Field document.
        field: DocRef,
        /// Current name.
        prior: Value,
        /// New name.
        name: String,
    },
    /// Reorder a field between two siblings.
    MoveField {
        /// Field document.
        field: DocRef,
        /// Neighbor order keys at the destination.
        between: OrderBetween,
    },

    /// Add a view between two siblings.
    AddView {
        /// View document.
        view: NewDoc,
        /// Neighbor order keys.
        between: OrderBetween,
    },
    /// Tombstone a view.
    DeleteView {
        /// View document.
        view: DocRef,
    },
    /// Reorder a view between two siblings.
    MoveView {
        /// View document.
        view: DocRef,
        /// Neighbor order keys at the destination.
        between: OrderBetween,
    },
    /// Replace a view's filter tree.
    UpdateViewFilter {
        /// View document.
        view: DocRef,
        /// Current filter.
        prior: Value,
        /// New filter.
        filter: Value,
    },

    /// Insert a batch of records.
    AddRecords {
        /// Record documents.
        records: Vec<NewDoc>,
    },
    /// Tombstone a record.
    DeleteRecord {
        /// Record document.
        record: DocRef,
    },
    /// Write one cell of a record.
    SetCell {
        /// Record document.
        record: DocRef,
        /// Field id of the cell.
        field_id: String,
        /// Current cell value.
        prior: Value,
        /// New cell value.
        value: Value,
    },
}

impl DomainCommand {
    /// Number of document ops this command fans out into, computed from the
    /// payload alone, before any op is submitted.
    pub fn op_count(&self) -> u32 {
        match self {
            DomainCommand::CreateTable {
                fields,
                views,
                records,
                ..
            } => 1 + (fields.len() + views.len() + records.len()) as u32,
            DomainCommand::DeleteTable {
                fields,
                views,
                records,
                ..
            } => 1 + (fields.len() + views.len() + records.len()) as u32,
            DomainCommand::AddRecords { records } => records.len() as u32,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_op_count_create_table() {
        let command = DomainCommand::CreateTable {
            table: NewDoc::new("tbl1", json!({ "name": "tasks" })),
            fields: vec![
                NewDoc::new("fld1", json!({ "name": "title" })),
                NewDoc::new("fld2", json!({ "name": "status" })),
            ],
            views: vec![NewDoc::new("viw1", json!({ "name": "grid" }))],
            records: vec![
                NewDoc::new("rec1", json!({ "cells": {} })),
                NewDoc::new("rec2", json!({ "cells": {} })),
                NewDoc::new("rec3", json!({ "cells": {} })),
            ],
        };

        // 1 table + 2 fields + 1 view + 3 records
        assert_eq!(command.op_count(), 7);
    }

    #[test]
    fn test_op_count_single_doc_commands() {
        let command = DomainCommand::SetCell {
            record: DocRef::at("rec1", 4),
            field_id: "fld1".to_string(),
            prior: json!("a"),
            value: json!("b"),
        };
        assert_eq!(command.op_count(), 1);

        let command = DomainCommand::AddRecords {
            records: vec![
                NewDoc::new("rec1", json!({})),
                NewDoc::new("rec2", json!({})),
            ],
        };
        assert_eq!(command.op_count(), 2);
    }
}
