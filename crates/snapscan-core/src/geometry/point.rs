//! Space-tagged points and quads.
//!
//! A capture is processed at two resolutions: the downscaled preview the
//! detector and the corner editor work on, and the full-resolution original
//! the rectifier samples from. Points carry a zero-sized marker for the
//! space they live in, so a preview coordinate can only reach original
//! space through [`Point2D::scale_to`] / [`Quad::scale_to`].

use std::fmt;
use std::marker::PhantomData;

/// Marker trait for coordinate spaces.
pub trait Space: Copy + Clone + fmt::Debug + Default + PartialEq + 'static {
    /// Human-readable name used in logs.
    const NAME: &'static str;
}

/// Coordinates of the downscaled working preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewSpace;

/// Coordinates of the full-resolution source image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OriginalSpace;

impl Space for PreviewSpace {
    const NAME: &'static str = "preview";
}

impl Space for OriginalSpace {
    const NAME: &'static str = "original";
}

/// A floating-point coordinate in space `S`.
#[derive(Clone, Copy, PartialEq)]
pub struct Point2D<S: Space> {
    pub x: f64,
    pub y: f64,
    space: PhantomData<S>,
}

impl<S: Space> Point2D<S> {
    pub const fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    /// Euclidean distance to another point in the same space.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Multiply both coordinates by `factor` and retag into space `T`.
    pub fn scale_to<T: Space>(&self, factor: f64) -> Point2D<T> {
        Point2D::new(self.x * factor, self.y * factor)
    }

    pub fn to_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl<S: Space> fmt::Debug for Point2D<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})@{}", self.x, self.y, S::NAME)
    }
}

/// Exactly four points in space `S`.
///
/// `Quad` stores corners in whatever order it was built with. Only
/// [`order_corners`](super::order_corners) establishes the canonical
/// (top-left, top-right, bottom-right, bottom-left) order; interactive edits
/// keep the caller's order.
#[derive(Clone, Copy, PartialEq)]
pub struct Quad<S: Space> {
    corners: [Point2D<S>; 4],
}

impl<S: Space> Quad<S> {
    /// Wrap four points as given, without reordering.
    pub const fn from_points(corners: [Point2D<S>; 4]) -> Self {
        Self { corners }
    }

    /// Build from a flat `[x0, y0, x1, y1, x2, y2, x3, y3]` array.
    pub fn from_flat(coords: [f64; 8]) -> Self {
        Self::from_points([
            Point2D::new(coords[0], coords[1]),
            Point2D::new(coords[2], coords[3]),
            Point2D::new(coords[4], coords[5]),
            Point2D::new(coords[6], coords[7]),
        ])
    }

    /// Axis-aligned rectangle from (left, top) to (right, bottom), canonical order.
    pub fn rect(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::from_points([
            Point2D::new(left, top),
            Point2D::new(right, top),
            Point2D::new(right, bottom),
            Point2D::new(left, bottom),
        ])
    }

    pub fn corners(&self) -> &[Point2D<S>; 4] {
        &self.corners
    }

    pub fn corners_mut(&mut self) -> &mut [Point2D<S>; 4] {
        &mut self.corners
    }

    pub fn into_points(self) -> [Point2D<S>; 4] {
        self.corners
    }

    pub fn to_flat(&self) -> [f64; 8] {
        let c = &self.corners;
        [
            c[0].x, c[0].y, c[1].x, c[1].y, c[2].x, c[2].y, c[3].x, c[3].y,
        ]
    }

    /// Scale every corner by `factor`, moving the quad into space `T`.
    pub fn scale_to<T: Space>(&self, factor: f64) -> Quad<T> {
        Quad::from_points(self.corners.map(|p| p.scale_to(factor)))
    }

    /// Shoelace area of the quad in its stored order.
    pub fn area(&self) -> f64 {
        super::polygon::shoelace_area(&self.corners.map(|p| p.to_array()))
    }
}

impl<S: Space> fmt::Debug for Quad<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.corners.iter()).finish()
    }
}
