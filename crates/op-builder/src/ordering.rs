//! Fractional order keys.
//!
//! Ordering-sensitive entities (fields within a table, views within a
//! table) each live in their own document, so renumbering siblings on
//! insert would need a multi-document write with no atomicity. Fractional
//! keys sidestep that: a new entity takes the midpoint between its
//! neighbors and no sibling is ever rewritten.

use crate::{BuilderError, BuilderResult};
use serde::{Deserialize, Serialize};

/// Neighbor order keys around an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBetween {
    /// Order of the entity before the insertion point, if any.
    pub prev: Option<f64>,
    /// Order of the entity after the insertion point, if any.
    pub next: Option<f64>,
}

impl OrderBetween {
    /// Insertion at the head of the list.
    pub fn head(next: f64) -> Self {
        Self {
            prev: None,
            next: Some(next),
        }
    }

    /// Insertion at the tail of the list.
    pub fn tail(prev: f64) -> Self {
        Self {
            prev: Some(prev),
            next: None,
        }
    }

    /// Insertion between two siblings.
    pub fn between(prev: f64, next: f64) -> Self {
        Self {
            prev: Some(prev),
            next: Some(next),
        }
    }
}

/// Compute an order key strictly between two neighbors.
///
/// Head and tail insertions extrapolate by `± 1` instead of halving toward
/// zero, which keeps keys from collapsing after repeated edge inserts.
pub fn order_between(bounds: OrderBetween) -> BuilderResult<f64> {
    match (bounds.prev, bounds.next) {
        // first entity in an empty list
        (None, None) => Ok(0.0),
        (Some(prev), None) => Ok(prev + 1.0),
        (None, Some(next)) => Ok(next - 1.0),
        (Some(prev), Some(next)) if prev < next => Ok((prev + next) / 2.0),
        (prev, next) => Err(BuilderError::InvalidOrderBounds { prev, next }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_between_neighbors() {
        let order = order_between(OrderBetween::between(1.0, 2.0)).unwrap();
        assert!(1.0 < order && order < 2.0);
        assert_eq!(order, 1.5);
    }

    #[test]
    fn test_head_and_tail_extrapolate() {
        assert_eq!(order_between(OrderBetween::head(0.0)).unwrap(), -1.0);
        assert_eq!(order_between(OrderBetween::tail(4.0)).unwrap(), 5.0);
        assert_eq!(order_between(OrderBetween::default()).unwrap(), 0.0);
    }

    #[test]
    fn test_neighbors_never_change() {
        // Stability: inserting between a and b leaves both untouched by
        // construction; the key must land strictly inside the gap even as
        // gaps shrink.
        let (a, mut b) = (1.0f64, 2.0f64);
        for _ in 0..40 {
            let new = order_between(OrderBetween::between(a, b)).unwrap();
            assert!(a < new && new < b);
            b = new;
        }
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = order_between(OrderBetween::between(2.0, 1.0)).unwrap_err();
        assert!(matches!(err, BuilderError::InvalidOrderBounds { .. }));

        assert!(order_between(OrderBetween::between(1.0, 1.0)).is_err());
    }

    #[test]
    fn test_repeated_tail_inserts_stay_ordered() {
        let mut last = 0.0;
        for _ in 0..100 {
            let next = order_between(OrderBetween::tail(last)).unwrap();
            assert!(next > last);
            last = next;
        }
    }
}
