//! Canonical corner ordering.
//!
//! Uses the sum/difference heuristic: the top-left corner has the smallest
//! `x + y`, the bottom-right the largest, the top-right the largest `x - y`
//! and the bottom-left the smallest. This is exact for convex, roughly
//! upright quads. Quads rotated close to 45 degrees can make one point win
//! two roles; that case is reported as [`CornerError::AmbiguousOrdering`]
//! instead of being patched up.

use thiserror::Error;

use super::{Point2D, Quad, Space};

/// Two points closer than this are considered the same corner.
pub const DUPLICATE_EPSILON: f64 = 1e-6;

/// Reasons a point set cannot be ordered into a quad.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CornerError {
    /// A coordinate is NaN or infinite.
    #[error("corner {index} has a non-finite coordinate")]
    NonFinite { index: usize },

    /// Fewer than four distinct points.
    #[error("corners {first} and {second} coincide; a quad needs four distinct points")]
    DuplicatePoints { first: usize, second: usize },

    /// The sum/difference rule picked the same point for two corners.
    #[error("corner ordering is ambiguous: point {index} qualifies as both {role_a} and {role_b}")]
    AmbiguousOrdering {
        index: usize,
        role_a: &'static str,
        role_b: &'static str,
    },
}

const ROLES: [&str; 4] = ["top-left", "top-right", "bottom-right", "bottom-left"];

/// Order four points as (top-left, top-right, bottom-right, bottom-left).
///
/// Top-left has the smallest `x + y`, bottom-right the largest; top-right
/// has the largest `x - y`, bottom-left the smallest. Ties go to the
/// earlier point, which makes the ordering idempotent.
///
/// # Arguments
///
/// * `points` - Four corners in any order
///
/// # Returns
///
/// The quad in canonical corner order.
///
/// # Errors
///
/// * `CornerError::NonFinite` - a coordinate is NaN or infinite
/// * `CornerError::DuplicatePoints` - two corners coincide
/// * `CornerError::AmbiguousOrdering` - one point wins two roles, as for
///   a thin sliver or a quad rotated by about 45 degrees
///
/// # Example
///
/// ```ignore
/// use snapscan_core::geometry::{order_corners, Point2D, PreviewSpace};
///
/// let p = |x, y| Point2D::<PreviewSpace>::new(x, y);
/// let quad = order_corners([p(100.0, 0.0), p(0.0, 50.0), p(0.0, 0.0), p(100.0, 50.0)])?;
/// assert_eq!(quad.corners()[0], p(0.0, 0.0));
/// ```
pub fn order_corners<S: Space>(points: [Point2D<S>; 4]) -> Result<Quad<S>, CornerError> {
    for (index, p) in points.iter().enumerate() {
        if !p.is_finite() {
            return Err(CornerError::NonFinite { index });
        }
    }
    for first in 0..4 {
        for second in first + 1..4 {
            if points[first].distance(&points[second]) <= DUPLICATE_EPSILON {
                return Err(CornerError::DuplicatePoints { first, second });
            }
        }
    }

    let sum = |p: &Point2D<S>| p.x + p.y;
    let diff = |p: &Point2D<S>| p.x - p.y;

    // First index wins on ties so the result is stable.
    let top_left = arg_extreme(&points, sum, Extreme::Min);
    let top_right = arg_extreme(&points, diff, Extreme::Max);
    let bottom_right = arg_extreme(&points, sum, Extreme::Max);
    let bottom_left = arg_extreme(&points, diff, Extreme::Min);

    let picks = [top_left, top_right, bottom_right, bottom_left];
    for a in 0..4 {
        for b in a + 1..4 {
            if picks[a] == picks[b] {
                return Err(CornerError::AmbiguousOrdering {
                    index: picks[a],
                    role_a: ROLES[a],
                    role_b: ROLES[b],
                });
            }
        }
    }

    Ok(Quad::from_points(picks.map(|i| points[i])))
}

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

fn arg_extreme<S: Space>(
    points: &[Point2D<S>; 4],
    key: impl Fn(&Point2D<S>) -> f64,
    extreme: Extreme,
) -> usize {
    let mut best = 0;
    for i in 1..4 {
        let better = match extreme {
            Extreme::Min => key(&points[i]) < key(&points[best]),
            Extreme::Max => key(&points[i]) > key(&points[best]),
        };
        if better {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PreviewSpace;

    fn p(x: f64, y: f64) -> Point2D<PreviewSpace> {
        Point2D::new(x, y)
    }

    #[test]
    fn test_orders_shuffled_rectangle() {
        let shuffled = [p(100.0, 0.0), p(0.0, 50.0), p(0.0, 0.0), p(100.0, 50.0)];
        let quad = order_corners(shuffled).unwrap();
        assert_eq!(
            quad.to_flat(),
            [0.0, 0.0, 100.0, 0.0, 100.0, 50.0, 0.0, 50.0]
        );
    }

    #[test]
    fn test_orders_keystoned_quad() {
        // Receipt photographed from below: top edge narrower than bottom.
        let quad = order_corners([
            p(820.0, 910.0),
            p(310.0, 120.0),
            p(160.0, 905.0),
            p(690.0, 130.0),
        ])
        .unwrap();
        assert_eq!(quad.corners()[0].to_array(), [310.0, 120.0]);
        assert_eq!(quad.corners()[1].to_array(), [690.0, 130.0]);
        assert_eq!(quad.corners()[2].to_array(), [820.0, 910.0]);
        assert_eq!(quad.corners()[3].to_array(), [160.0, 905.0]);
    }

    #[test]
    fn test_rejects_duplicate_points() {
        let result = order_corners([p(0.0, 0.0), p(10.0, 0.0), p(10.0, 0.0), p(0.0, 10.0)]);
        assert_eq!(
            result,
            Err(CornerError::DuplicatePoints {
                first: 1,
                second: 2
            })
        );
    }

    #[test]
    fn test_rejects_all_same_point() {
        let result = order_corners([p(5.0, 5.0); 4]);
        assert!(matches!(result, Err(CornerError::DuplicatePoints { .. })));
    }

    #[test]
    fn test_rejects_non_finite() {
        let result = order_corners([p(0.0, 0.0), p(f64::NAN, 0.0), p(1.0, 1.0), p(0.0, 1.0)]);
        assert_eq!(result, Err(CornerError::NonFinite { index: 1 }));
    }

    #[test]
    fn test_rejects_diamond_as_ambiguous() {
        // A square rotated 45 degrees: the left and top vertices tie on sum,
        // the top vertex is also the max-diff point.
        let result = order_corners([p(50.0, 0.0), p(100.0, 50.0), p(50.0, 100.0), p(0.0, 50.0)]);
        assert!(matches!(result, Err(CornerError::AmbiguousOrdering { .. })));
    }

    #[test]
    fn test_idempotent_on_canonical_input() {
        let canonical = [p(12.0, 9.0), p(400.0, 20.0), p(390.0, 610.0), p(5.0, 600.0)];
        let once = order_corners(canonical).unwrap();
        let twice = order_corners(once.into_points()).unwrap();
        assert_eq!(once, twice);
    }
}
