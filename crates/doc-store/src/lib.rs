//! Versioned OT document store for grid schema and cell data.
//!
//! Documents are identified by `(collection, id)` and mutated only through
//! path-addressed operations. Concurrent writers against one document are
//! serialized and rebased via operational transformation; writers against
//! different documents never block each other.
//!
//! # Core Invariants
//!
//! 1. **Total order per document**: application order equals commit order
//! 2. **Rebase, never drop**: a stale op is transformed against everything
//!    committed since its base, not rejected or overwritten
//! 3. **All-or-nothing**: a rejected op applies none of its edits
//! 4. **Gap-free versions**: N successful submits move the version from its
//!    creation version to creation version + N
//! 5. **Terminal tombstones**: deletes are ops; late edits against a
//!    deleted document fail deterministically with `NotFound`

mod collection;
mod db;
mod error;
mod migrations;
mod models;
pub mod op;
pub mod transform;

mod store;

pub use collection::Collection;
pub use db::Database;
pub use error::{DocStoreError, DocStoreResult};
pub use models::{CommittedOp, DocOp, DocState};
pub use op::{apply, Edit, EditKind, Operation, Path, PathSeg};
pub use store::{DocChange, DocSnapshot, DocStore, SubmitOutcome};
pub use transform::{transform_op, Side};
