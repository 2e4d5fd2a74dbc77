//! Path-addressed edit operations over JSON document snapshots.
//!
//! An [`Operation`] is an ordered list of [`Edit`]s, each addressing one
//! location in the snapshot by path. Operations are the only persisted
//! mutation record; the snapshot is a derived fold of all applied ops.

use crate::{DocStoreError, DocStoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One segment of an edit path: an object key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSeg {
    /// List index.
    Index(usize),
    /// Object key.
    Key(String),
}

impl PathSeg {
    /// Object key segment.
    pub fn key(k: impl Into<String>) -> Self {
        PathSeg::Key(k.into())
    }

    /// List index segment.
    pub fn idx(i: usize) -> Self {
        PathSeg::Index(i)
    }
}

/// Path from the snapshot root to an edit target.
pub type Path = Vec<PathSeg>;

/// What an edit does at its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EditKind {
    /// Insert `value` at a list index (shifting later elements right) or
    /// under a fresh object key.
    Insert {
        /// Value to insert.
        value: Value,
    },
    /// Remove the value at the path. `prior` records what was removed.
    Delete {
        /// Removed value, kept for audit and transform bookkeeping.
        prior: Value,
    },
    /// Replace the value at the path wholesale.
    Replace {
        /// Value being replaced. Advisory; apply does not check it.
        prior: Value,
        /// New value.
        value: Value,
    },
    /// Move the list element at the path's final index to `to` (an index in
    /// the list after removal).
    Move {
        /// Destination index.
        to: usize,
    },
}

/// A single path-addressed edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit {
    /// Path from the snapshot root to the target slot.
    pub path: Path,
    /// Edit payload.
    #[serde(flatten)]
    pub kind: EditKind,
}

impl Edit {
    /// Insert `value` at `path`.
    pub fn insert(path: Path, value: Value) -> Self {
        Self {
            path,
            kind: EditKind::Insert { value },
        }
    }

    /// Delete the value at `path`, recording `prior`.
    pub fn delete(path: Path, prior: Value) -> Self {
        Self {
            path,
            kind: EditKind::Delete { prior },
        }
    }

    /// Replace the value at `path`.
    pub fn replace(path: Path, prior: Value, value: Value) -> Self {
        Self {
            path,
            kind: EditKind::Replace { prior, value },
        }
    }

    /// Move the list element at `path` to index `to`.
    pub fn list_move(path: Path, to: usize) -> Self {
        Self {
            path,
            kind: EditKind::Move { to },
        }
    }
}

/// An ordered list of edits applied atomically against one document version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Operation {
    /// Edits in application order.
    pub edits: Vec<Edit>,
}

impl Operation {
    /// Operation from a list of edits.
    pub fn new(edits: Vec<Edit>) -> Self {
        Self { edits }
    }

    /// Operation containing a single edit.
    pub fn single(edit: Edit) -> Self {
        Self { edits: vec![edit] }
    }

    /// True if every edit was transformed away.
    pub fn is_noop(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Apply an operation to a snapshot, producing the next snapshot.
///
/// Application is all-or-nothing: any failing edit rejects the whole
/// operation and the input snapshot is untouched.
pub fn apply(snapshot: &Value, op: &Operation) -> DocStoreResult<Value> {
    let mut next = snapshot.clone();
    for edit in &op.edits {
        apply_edit(&mut next, edit)?;
    }
    Ok(next)
}

fn apply_edit(root: &mut Value, edit: &Edit) -> DocStoreResult<()> {
    let (last, parents) = edit
        .path
        .split_last()
        .ok_or_else(|| DocStoreError::InvalidOperation("empty edit path".to_string()))?;

    let parent = descend_mut(root, parents)?;

    match (&edit.kind, last) {
        (EditKind::Insert { value }, PathSeg::Index(i)) => {
            let list = as_list_mut(parent)?;
            if *i > list.len() {
                return Err(out_of_bounds(*i, list.len()));
            }
            list.insert(*i, value.clone());
        }
        (EditKind::Insert { value }, PathSeg::Key(k)) => {
            let obj = as_object_mut(parent)?;
            if obj.contains_key(k) {
                return Err(DocStoreError::InvalidOperation(format!(
                    "insert into existing key {k:?}"
                )));
            }
            obj.insert(k.clone(), value.clone());
        }
        (EditKind::Delete { .. }, PathSeg::Index(i)) => {
            let list = as_list_mut(parent)?;
            if *i >= list.len() {
                return Err(out_of_bounds(*i, list.len()));
            }
            list.remove(*i);
        }
        (EditKind::Delete { .. }, PathSeg::Key(k)) => {
            let obj = as_object_mut(parent)?;
            obj.remove(k).ok_or_else(|| {
                DocStoreError::InvalidOperation(format!("delete of missing key {k:?}"))
            })?;
        }
        (EditKind::Replace { value, .. }, PathSeg::Index(i)) => {
            let list = as_list_mut(parent)?;
            if *i >= list.len() {
                return Err(out_of_bounds(*i, list.len()));
            }
            list[*i] = value.clone();
        }
        (EditKind::Replace { value, .. }, PathSeg::Key(k)) => {
            let obj = as_object_mut(parent)?;
            obj.insert(k.clone(), value.clone());
        }
        (EditKind::Move { to }, PathSeg::Index(from)) => {
            let list = as_list_mut(parent)?;
            if *from >= list.len() {
                return Err(out_of_bounds(*from, list.len()));
            }
            let value = list.remove(*from);
            let dest = (*to).min(list.len());
            list.insert(dest, value);
        }
        (EditKind::Move { .. }, PathSeg::Key(_)) => {
            return Err(DocStoreError::InvalidOperation(
                "move addresses an object key, expected a list index".to_string(),
            ));
        }
    }

    Ok(())
}

fn descend_mut<'a>(root: &'a mut Value, segs: &[PathSeg]) -> DocStoreResult<&'a mut Value> {
    let mut current = root;
    for seg in segs {
        current = match seg {
            PathSeg::Key(k) => current.get_mut(k.as_str()).ok_or_else(|| {
                DocStoreError::InvalidOperation(format!("path key {k:?} not found"))
            })?,
            PathSeg::Index(i) => current.get_mut(*i).ok_or_else(|| {
                DocStoreError::InvalidOperation(format!("path index {i} not found"))
            })?,
        };
    }
    Ok(current)
}

fn as_list_mut(value: &mut Value) -> DocStoreResult<&mut Vec<Value>> {
    value
        .as_array_mut()
        .ok_or_else(|| DocStoreError::InvalidOperation("expected a list at path".to_string()))
}

fn as_object_mut(
    value: &mut Value,
) -> DocStoreResult<&mut serde_json::Map<String, Value>> {
    value
        .as_object_mut()
        .ok_or_else(|| DocStoreError::InvalidOperation("expected an object at path".to_string()))
}

fn out_of_bounds(index: usize, len: usize) -> DocStoreError {
    DocStoreError::InvalidOperation(format!("index {index} out of bounds (len {len})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_insert_and_delete() {
        let doc = json!({ "fields": ["a", "b", "c"] });

        let inserted = apply(
            &doc,
            &Operation::single(Edit::insert(
                vec![PathSeg::key("fields"), PathSeg::idx(1)],
                json!("x"),
            )),
        )
        .unwrap();
        assert_eq!(inserted["fields"], json!(["a", "x", "b", "c"]));

        let deleted = apply(
            &inserted,
            &Operation::single(Edit::delete(
                vec![PathSeg::key("fields"), PathSeg::idx(0)],
                json!("a"),
            )),
        )
        .unwrap();
        assert_eq!(deleted["fields"], json!(["x", "b", "c"]));
    }

    #[test]
    fn test_object_insert_existing_key_rejected() {
        let doc = json!({ "name": "tasks" });

        let err = apply(
            &doc,
            &Operation::single(Edit::insert(vec![PathSeg::key("name")], json!("other"))),
        )
        .unwrap_err();
        assert!(matches!(err, DocStoreError::InvalidOperation(_)));
    }

    #[test]
    fn test_replace_nested() {
        let doc = json!({ "fields": [{ "name": "X" }, { "name": "Y" }] });

        let next = apply(
            &doc,
            &Operation::single(Edit::replace(
                vec![PathSeg::key("fields"), PathSeg::idx(1), PathSeg::key("name")],
                json!("Y"),
                json!("Z"),
            )),
        )
        .unwrap();
        assert_eq!(next["fields"][1]["name"], json!("Z"));
        // untouched sibling
        assert_eq!(next["fields"][0]["name"], json!("X"));
    }

    #[test]
    fn test_list_move() {
        let doc = json!({ "views": ["grid", "kanban", "form"] });

        let next = apply(
            &doc,
            &Operation::single(Edit::list_move(
                vec![PathSeg::key("views"), PathSeg::idx(0)],
                2,
            )),
        )
        .unwrap();
        assert_eq!(next["views"], json!(["kanban", "form", "grid"]));
    }

    #[test]
    fn test_failed_edit_leaves_snapshot_untouched() {
        let doc = json!({ "fields": ["a"] });

        let op = Operation::new(vec![
            Edit::insert(vec![PathSeg::key("fields"), PathSeg::idx(1)], json!("b")),
            Edit::delete(vec![PathSeg::key("fields"), PathSeg::idx(9)], json!("?")),
        ]);

        assert!(apply(&doc, &op).is_err());
        // original untouched even though the first edit would have applied
        assert_eq!(doc["fields"], json!(["a"]));
    }

    #[test]
    fn test_operation_serde_round_trip() {
        let op = Operation::new(vec![
            Edit::insert(vec![PathSeg::key("fields"), PathSeg::idx(2)], json!({"id": "fld1"})),
            Edit::list_move(vec![PathSeg::key("views"), PathSeg::idx(1)], 0),
        ]);

        let json = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_path_seg_serde_shape() {
        let path = vec![PathSeg::key("fields"), PathSeg::idx(3)];
        let json = serde_json::to_value(&path).unwrap();
        assert_eq!(json, json!(["fields", 3]));
    }
}
