//! Transaction correlation for multi-document commands.
//!
//! A domain command ("create table") fans out into N independent document
//! operations. There is no cross-document transaction primitive: each op
//! commits or fails on its own. This crate provides the correlation token
//! that lets a consumer count arrivals and detect completion or partial
//! failure:
//!
//! - [`TransactionMeta`]: `{ transaction_key, op_count }`, generated once per
//!   command and stamped onto every resulting op
//! - [`TransactionTracker`]: consumer-side arrival counting with an explicit
//!   caller deadline; never rolls anything back
//!
//! # Core Invariants
//!
//! 1. **Precomputed count**: `op_count` is derived from the command payload
//!    before any op is submitted
//! 2. **Exactly k arrivals**: observing more than `op_count` ops under one
//!    key is an error, never a silent wrap-around
//! 3. **No rollback**: a partial transaction is reported, not compensated

mod error;
mod meta;
mod tracker;

pub use error::{TxnError, TxnResult};
pub use meta::TransactionMeta;
pub use tracker::{Progress, TransactionTracker};
