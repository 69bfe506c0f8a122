//! Coordinate types and the pure geometry used by detection and rectification.

mod homography;
mod order;
mod point;
mod polygon;

pub use homography::{Homography, HomographyError};
pub use order::{order_corners, CornerError, DUPLICATE_EPSILON};
pub use point::{OriginalSpace, Point2D, PreviewSpace, Quad, Space};
pub use polygon::{approximate_closed_polygon, closed_perimeter, shoelace_area};
