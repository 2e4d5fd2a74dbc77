//! Command plan execution.
//!
//! Submits a plan's steps to the store in order, stamping every op with the
//! plan's transaction token. There is no cross-document transaction: a step
//! that fails stops the run and the steps already committed stay committed.
//! The caller gets a [`ExecError::PartialTransaction`] naming how far the
//! command got and reconciles from there; nothing is rolled back or
//! retried here (a blind retry could duplicate committed sub-operations).

use doc_store::{Collection, DocStore, DocStoreError};
use op_builder::{CommandPlan, OpStep};
use thiserror::Error;
use tracing::{info, warn};
use txn_coordinator::TransactionMeta;

/// Execution error type.
#[derive(Error, Debug)]
pub enum ExecError {
    /// A step failed after earlier steps committed.
    #[error("transaction {key} partially applied: {committed} of {expected} ops committed: {source}")]
    PartialTransaction {
        /// Transaction key of the failed command.
        key: String,
        /// Steps that committed before the failure.
        committed: u32,
        /// Steps the command declared.
        expected: u32,
        /// The failing step's error.
        #[source]
        source: DocStoreError,
    },
}

/// What one committed step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Target collection.
    pub collection: Collection,
    /// Document id.
    pub id: String,
    /// Version the step produced.
    pub version: u64,
}

/// A fully committed command.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// The command's transaction token.
    pub meta: TransactionMeta,
    /// Per-step results, in submission order.
    pub outcomes: Vec<StepOutcome>,
}

/// Execute every step of a plan against the store.
pub async fn execute_plan(
    store: &DocStore,
    plan: CommandPlan,
) -> Result<ExecutionReport, ExecError> {
    let meta = plan.meta;
    let expected = meta.op_count;
    let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(plan.steps.len());

    for step in plan.steps {
        let result = match step {
            OpStep::Create {
                collection,
                id,
                snapshot,
            } => store
                .create(collection, &id, snapshot, Some(meta.clone()))
                .await
                .map(|version| StepOutcome {
                    collection,
                    id,
                    version,
                }),
            OpStep::Edit {
                collection,
                id,
                base_version,
                op,
            } => store
                .submit(collection, &id, base_version, op, Some(meta.clone()))
                .await
                .map(|outcome| StepOutcome {
                    collection,
                    id,
                    version: outcome.new_version,
                }),
            OpStep::Delete {
                collection,
                id,
                base_version,
            } => store
                .delete(collection, &id, base_version, Some(meta.clone()))
                .await
                .map(|version| StepOutcome {
                    collection,
                    id,
                    version,
                }),
        };

        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(source) => {
                warn!(
                    key = %meta.transaction_key,
                    committed = outcomes.len(),
                    expected,
                    error = %source,
                    "Command partially applied"
                );
                return Err(ExecError::PartialTransaction {
                    key: meta.transaction_key.clone(),
                    committed: outcomes.len() as u32,
                    expected,
                    source,
                });
            }
        }
    }

    info!(
        key = %meta.transaction_key,
        ops = outcomes.len(),
        "Command committed"
    );
    Ok(ExecutionReport { meta, outcomes })
}
