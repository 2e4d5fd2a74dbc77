//! Operational transformation of concurrent edits.
//!
//! `transform_op(ours, theirs, side)` rewrites `ours` so it applies after
//! `theirs` with the intent both authors had at their shared base version.
//! The committed op is always the [`Side::Left`] op; an incoming op being
//! rebased takes [`Side::Right`]. Tie-breaks:
//!
//! - concurrent list inserts at the same index: the left (committed) value
//!   stays first, the right insert lands after it
//! - concurrent replaces of the same slot: the right (last committer) value
//!   wins
//! - edits inside a subtree the other op deleted or replaced are dropped

use crate::op::{Edit, EditKind, Operation, PathSeg};

/// Which side of a concurrent pair an op is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The op committed first.
    Left,
    /// The op being rebased onto the left one.
    Right,
}

/// Transform `ours` against a concurrently committed `theirs`.
///
/// Edits that no longer have a target (their subtree was deleted or
/// replaced) are dropped; the result may be a no-op.
pub fn transform_op(ours: &Operation, theirs: &Operation, side: Side) -> Operation {
    let mut edits: Vec<Edit> = ours.edits.clone();
    for their_edit in &theirs.edits {
        edits = edits
            .into_iter()
            .filter_map(|edit| transform_edit(edit, their_edit, side))
            .collect();
    }
    Operation { edits }
}

/// Transform a single edit against one committed edit.
fn transform_edit(ours: Edit, theirs: &Edit, side: Side) -> Option<Edit> {
    // Depth of the container theirs operates in; theirs' last path segment
    // names the slot inside that container.
    let Some(d) = theirs.path.len().checked_sub(1) else {
        return Some(ours);
    };

    // Ours is only affected if its path passes through theirs' container.
    if ours.path.len() <= d || ours.path[..d] != theirs.path[..d] {
        return Some(ours);
    }

    let same_level = ours.path.len() == d + 1;

    match &theirs.kind {
        EditKind::Insert { value } => match &theirs.path[d] {
            PathSeg::Index(i) => through_list_insert(ours, d, *i, same_level, side),
            PathSeg::Key(k) => through_object_insert(ours, d, k, value, same_level, side),
        },
        EditKind::Delete { .. } => match &theirs.path[d] {
            PathSeg::Index(i) => through_list_delete(ours, d, *i, same_level),
            PathSeg::Key(k) => through_object_delete(ours, d, k, same_level),
        },
        EditKind::Replace { value, .. } => through_replace(ours, theirs, d, value, same_level, side),
        EditKind::Move { to } => match &theirs.path[d] {
            PathSeg::Index(f) => through_list_move(ours, d, *f, *to, same_level, side),
            PathSeg::Key(_) => Some(ours),
        },
    }
}

fn seg_index(seg: &PathSeg) -> Option<usize> {
    match seg {
        PathSeg::Index(i) => Some(*i),
        PathSeg::Key(_) => None,
    }
}

/// Theirs inserted at list index `i`.
fn through_list_insert(
    mut ours: Edit,
    d: usize,
    i: usize,
    same_level: bool,
    side: Side,
) -> Option<Edit> {
    // A key segment here means ours addresses a different container shape;
    // nothing to adjust.
    let Some(j) = seg_index(&ours.path[d]) else {
        return Some(ours);
    };

    if !same_level {
        // Descending through an element: follow it as it shifts right.
        if j >= i {
            ours.path[d] = PathSeg::Index(j + 1);
        }
        return Some(ours);
    }

    match &mut ours.kind {
        EditKind::Insert { .. } => {
            // Same-index tie: the left insert keeps the slot.
            if j > i || (j == i && side == Side::Right) {
                ours.path[d] = PathSeg::Index(j + 1);
            }
        }
        EditKind::Delete { .. } | EditKind::Replace { .. } => {
            if j >= i {
                ours.path[d] = PathSeg::Index(j + 1);
            }
        }
        EditKind::Move { to } => {
            // `to` is a post-removal index; compare its pre-removal
            // boundary against the insert point.
            let to_pre = if j <= *to { *to + 1 } else { *to };
            if to_pre >= i {
                *to += 1;
            }
            if j >= i {
                ours.path[d] = PathSeg::Index(j + 1);
            }
        }
    }
    Some(ours)
}

/// Theirs deleted list index `i`.
fn through_list_delete(mut ours: Edit, d: usize, i: usize, same_level: bool) -> Option<Edit> {
    let Some(j) = seg_index(&ours.path[d]) else {
        return Some(ours);
    };

    if !same_level {
        // The element ours descends into is gone.
        if j == i {
            return None;
        }
        if j > i {
            ours.path[d] = PathSeg::Index(j - 1);
        }
        return Some(ours);
    }

    match &mut ours.kind {
        EditKind::Insert { .. } => {
            // Inserting at the vacated position is fine.
            if j > i {
                ours.path[d] = PathSeg::Index(j - 1);
            }
        }
        EditKind::Delete { .. } | EditKind::Replace { .. } => {
            if j == i {
                return None;
            }
            if j > i {
                ours.path[d] = PathSeg::Index(j - 1);
            }
        }
        EditKind::Move { to } => {
            if j == i {
                return None;
            }
            let to_pre = if j <= *to { *to + 1 } else { *to };
            if to_pre > i {
                *to -= 1;
            }
            if j > i {
                ours.path[d] = PathSeg::Index(j - 1);
            }
        }
    }
    Some(ours)
}

/// Theirs inserted object key `k` with `value`.
fn through_object_insert(
    ours: Edit,
    d: usize,
    k: &str,
    value: &serde_json::Value,
    same_level: bool,
    side: Side,
) -> Option<Edit> {
    match &ours.path[d] {
        PathSeg::Key(ok) if ok == k => {}
        _ => return Some(ours),
    }
    if !same_level {
        return Some(ours);
    }

    match (&ours.kind, side) {
        // Both sides created the same key: the right value wins by becoming
        // a replace; the left insert is dropped on the other replica.
        (EditKind::Insert { value: ours_value }, Side::Right) => Some(Edit::replace(
            ours.path.clone(),
            value.clone(),
            ours_value.clone(),
        )),
        (EditKind::Insert { .. }, Side::Left) => None,
        _ => Some(ours),
    }
}

/// Theirs deleted object key `k`.
fn through_object_delete(ours: Edit, d: usize, k: &str, same_level: bool) -> Option<Edit> {
    match &ours.path[d] {
        PathSeg::Key(ok) if ok == k => {}
        _ => return Some(ours),
    }
    if !same_level {
        return None;
    }

    match &ours.kind {
        // Re-creating a deleted key stands.
        EditKind::Insert { .. } => Some(ours),
        // The delete wins over any edit of the same key.
        EditKind::Delete { .. } | EditKind::Replace { .. } => None,
        EditKind::Move { .. } => Some(ours),
    }
}

/// Theirs replaced the value at its full path.
fn through_replace(
    mut ours: Edit,
    theirs: &Edit,
    d: usize,
    new_value: &serde_json::Value,
    same_level: bool,
    side: Side,
) -> Option<Edit> {
    if ours.path[d] != theirs.path[d] {
        return Some(ours);
    }
    if !same_level {
        // Ours edits inside a subtree that was wholesale replaced.
        return None;
    }

    match (&mut ours.kind, side) {
        (EditKind::Replace { .. }, Side::Left) => None,
        (EditKind::Replace { prior, .. }, Side::Right) => {
            *prior = new_value.clone();
            Some(ours)
        }
        (EditKind::Delete { prior }, _) => {
            *prior = new_value.clone();
            Some(ours)
        }
        _ => Some(ours),
    }
}

/// Element index after a committed move of `f` to `t`.
fn move_adjust(j: usize, f: usize, t: usize) -> usize {
    if j == f {
        t
    } else if f < j && j <= t {
        j - 1
    } else if t <= j && j < f {
        j + 1
    } else {
        j
    }
}

/// Theirs moved list index `f` to `t`.
fn through_list_move(
    mut ours: Edit,
    d: usize,
    f: usize,
    t: usize,
    same_level: bool,
    side: Side,
) -> Option<Edit> {
    let Some(j) = seg_index(&ours.path[d]) else {
        return Some(ours);
    };

    if !same_level {
        ours.path[d] = PathSeg::Index(move_adjust(j, f, t));
        return Some(ours);
    }

    match &mut ours.kind {
        EditKind::Insert { .. } => {
            // Insert positions shift as if the move were a delete then an
            // insert; an insert landing exactly at the moved element's new
            // slot goes before it.
            let mut j2 = if j > f { j - 1 } else { j };
            if j2 > t {
                j2 += 1;
            }
            ours.path[d] = PathSeg::Index(j2);
        }
        EditKind::Delete { .. } | EditKind::Replace { .. } => {
            ours.path[d] = PathSeg::Index(move_adjust(j, f, t));
        }
        EditKind::Move { to } => {
            if j == f {
                // Both sides moved the same element: the right move wins,
                // picking it up from its new position. The list minus that
                // element is unchanged, so `to` still means the same slot.
                if side == Side::Left {
                    return None;
                }
                ours.path[d] = PathSeg::Index(t);
            } else {
                ours.path[d] = PathSeg::Index(move_adjust(j, f, t));
                *to = move_adjust(*to, f, t);
            }
        }
    }
    Some(ours)
}
