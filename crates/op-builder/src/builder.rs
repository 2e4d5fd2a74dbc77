//! Command-to-op translation.
//!
//! Pure: no I/O, no store access. Given a command and the caller's known
//! document versions, produce the ops to submit plus the shared transaction
//! token. Every step still commits independently; the token is what lets a
//! consumer detect completion.

use crate::commands::{DomainCommand, NewDoc};
use crate::ordering::{order_between, OrderBetween};
use crate::{BuilderError, BuilderResult};
use doc_store::{Collection, Edit, Operation, PathSeg};
use serde_json::Value;
use txn_coordinator::TransactionMeta;

/// One document op of a command plan.
#[derive(Debug, Clone, PartialEq)]
pub enum OpStep {
    /// Create a document.
    Create {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
        /// Initial snapshot.
        snapshot: Value,
    },
    /// Edit a document.
    Edit {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
        /// Version the op was built against.
        base_version: u64,
        /// The edit op.
        op: Operation,
    },
    /// Tombstone a document.
    Delete {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
        /// Version the delete was built against.
        base_version: u64,
    },
}

/// A translated command: N steps under one transaction token.
#[derive(Debug, Clone)]
pub struct CommandPlan {
    /// Token stamped onto every step's submission.
    pub meta: TransactionMeta,
    /// Steps in submission order.
    pub steps: Vec<OpStep>,
}

/// Translate a domain command into its op plan.
pub fn build_plan(command: DomainCommand) -> BuilderResult<CommandPlan> {
    let op_count = command.op_count();
    if op_count == 0 {
        return Err(BuilderError::EmptyCommand);
    }
    let meta = TransactionMeta::generate(op_count)?;

    let steps = match command {
        DomainCommand::CreateTable {
            table,
            fields,
            views,
            records,
        } => {
            let mut steps = vec![create_step(Collection::Table, table)?];
            steps.extend(create_ordered(Collection::Field, fields)?);
            steps.extend(create_ordered(Collection::View, views)?);
            for record in records {
                steps.push(create_step(Collection::Record, record)?);
            }
            steps
        }

        DomainCommand::DeleteTable {
            table,
            fields,
            views,
            records,
        } => {
            let mut steps = Vec::with_capacity(op_count as usize);
            // children first so a partially applied delete never leaves
            // orphans under a missing table
            for field in fields {
                steps.push(OpStep::Delete {
                    collection: Collection::Field,
                    id: field.id,
                    base_version: field.version,
                });
            }
            for view in views {
                steps.push(OpStep::Delete {
                    collection: Collection::View,
                    id: view.id,
                    base_version: view.version,
                });
            }
            for record in records {
                steps.push(OpStep::Delete {
                    collection: Collection::Record,
                    id: record.id,
                    base_version: record.version,
                });
            }
            steps.push(OpStep::Delete {
                collection: Collection::Table,
                id: table.id,
                base_version: table.version,
            });
            steps
        }

        DomainCommand::RenameTable { table, prior, name } => vec![OpStep::Edit {
            collection: Collection::Table,
            id: table.id,
            base_version: table.version,
            op: replace_key("name", prior, Value::String(name)),
        }],

        DomainCommand::UpdateTableMeta {
            table,
            key,
            prior,
            value,
        } => vec![OpStep::Edit {
            collection: Collection::Table,
            id: table.id,
            base_version: table.version,
            op: replace_key(&key, prior, value),
        }],

        DomainCommand::AddField { field, between } => {
            vec![create_with_order(Collection::Field, field, between)?]
        }

        DomainCommand::DeleteField { field } => vec![OpStep::Delete {
            collection: Collection::Field,
            id: field.id,
            base_version: field.version,
        }],

        DomainCommand::RenameField { field, prior, name } => vec![OpStep::Edit {
            collection: Collection::Field,
            id: field.id,
            base_version: field.version,
            op: replace_key("name", prior, Value::String(name)),
        }],

        DomainCommand::MoveField { field, between } => {
            let order = order_between(between)?;
            vec![OpStep::Edit {
                collection: Collection::Field,
                id: field.id,
                base_version: field.version,
                op: replace_key("order", Value::Null, order.into()),
            }]
        }

        DomainCommand::AddView { view, between } => {
            vec![create_with_order(Collection::View, view, between)?]
        }

        DomainCommand::DeleteView { view } => vec![OpStep::Delete {
            collection: Collection::View,
            id: view.id,
            base_version: view.version,
        }],

        DomainCommand::MoveView { view, between } => {
            let order = order_between(between)?;
            vec![OpStep::Edit {
                collection: Collection::View,
                id: view.id,
                base_version: view.version,
                op: replace_key("order", Value::Null, order.into()),
            }]
        }

        DomainCommand::UpdateViewFilter {
            view,
            prior,
            filter,
        } => vec![OpStep::Edit {
            collection: Collection::View,
            id: view.id,
            base_version: view.version,
            op: replace_key("filter", prior, filter),
        }],

        DomainCommand::AddRecords { records } => {
            let mut steps = Vec::with_capacity(records.len());
            for record in records {
                steps.push(create_step(Collection::Record, record)?);
            }
            steps
        }

        DomainCommand::DeleteRecord { record } => vec![OpStep::Delete {
            collection: Collection::Record,
            id: record.id,
            base_version: record.version,
        }],

        DomainCommand::SetCell {
            record,
            field_id,
            prior,
            value,
        } => vec![OpStep::Edit {
            collection: Collection::Record,
            id: record.id,
            base_version: record.version,
            op: Operation::single(Edit::replace(
                vec![PathSeg::key("cells"), PathSeg::key(field_id)],
                prior,
                value,
            )),
        }],
    };

    debug_assert_eq!(steps.len() as u32, meta.op_count);
    Ok(CommandPlan { meta, steps })
}

fn replace_key(key: &str, prior: Value, value: Value) -> Operation {
    Operation::single(Edit::replace(vec![PathSeg::key(key)], prior, value))
}

fn create_step(collection: Collection, doc: NewDoc) -> BuilderResult<OpStep> {
    if !doc.data.is_object() {
        return Err(BuilderError::InvalidSnapshot(format!(
            "{collection} snapshot for {:?} must be a JSON object",
            doc.id
        )));
    }
    Ok(OpStep::Create {
        collection,
        id: doc.id,
        snapshot: doc.data,
    })
}

fn create_with_order(
    collection: Collection,
    doc: NewDoc,
    between: OrderBetween,
) -> BuilderResult<OpStep> {
    let order = order_between(between)?;
    create_with_order_value(collection, doc, order)
}

/// Sequential orders for a fresh sibling list: 0, 1, 2, …
fn create_ordered(collection: Collection, docs: Vec<NewDoc>) -> BuilderResult<Vec<OpStep>> {
    let mut steps = Vec::with_capacity(docs.len());
    let mut prev: Option<f64> = None;
    for doc in docs {
        let order = order_between(OrderBetween { prev, next: None })?;
        prev = Some(order);
        steps.push(create_with_order_value(collection, doc, order)?);
    }
    Ok(steps)
}

fn create_with_order_value(
    collection: Collection,
    doc: NewDoc,
    order: f64,
) -> BuilderResult<OpStep> {
    let step = create_step(collection, doc)?;
    match step {
        OpStep::Create {
            collection,
            id,
            mut snapshot,
        } => {
            snapshot
                .as_object_mut()
                .expect("checked by create_step")
                .insert("order".to_string(), order.into());
            Ok(OpStep::Create {
                collection,
                id,
                snapshot,
            })
        }
        _ => unreachable!("create_step builds Create steps"),
    }
}
