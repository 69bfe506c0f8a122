//! Perspective rectification of the document region.
//!
//! The user's quad lives in preview space; it is scaled onto the original
//! capture, re-ordered, and the enclosed region is warped to an upright
//! rectangle whose size follows the measured edge lengths.

mod warp;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::geometry::{
    order_corners, CornerError, Homography, HomographyError, OriginalSpace, Point2D, PreviewSpace,
    Quad,
};
use crate::raster::RasterImage;

/// Output rasters are never narrower or shorter than this.
pub const MIN_OUTPUT_SIDE: u32 = 4;

/// Corner triples whose turn is flatter than this (sine of the angle) are
/// treated as collinear.
const COLLINEAR_SINE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RectifyError {
    /// The scaled corners cannot be put in canonical order.
    #[error("cannot order corners: {0}")]
    Corner(#[from] CornerError),

    /// Three of the four corners lie on one line.
    #[error("corners {a}, {b} and {c} are collinear")]
    Collinear { a: usize, b: usize, c: usize },

    /// The perspective transform could not be solved or inverted.
    #[error("perspective transform is not invertible: {0}")]
    NonInvertible(#[from] HomographyError),

    #[error("invalid rectify input: {0}")]
    InvalidInput(String),
}

/// Options for [`rectify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectifyOptions {
    /// Original width divided by preview width.
    pub scale_factor: f64,
    /// Output width cap; height follows the quad's aspect ratio.
    pub max_output_width: u32,
    /// Colour for output pixels that map outside the source.
    pub border: [u8; 3],
}

impl Default for RectifyOptions {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            max_output_width: 1600,
            border: [0, 0, 0],
        }
    }
}

/// Output size for an ordered quad: the longer of each pair of opposite
/// edges, scaled down together so the width fits `max_output_width`,
/// rounded, and floored at [`MIN_OUTPUT_SIDE`].
///
/// # Arguments
///
/// * `quad` - Corners in original pixels, in (TL, TR, BR, BL) order
/// * `max_output_width` - Width cap; the height is scaled by the same factor
///
/// # Returns
///
/// `(width, height)` of the rectified raster, each at least [`MIN_OUTPUT_SIDE`].
pub fn target_dimensions(quad: &Quad<OriginalSpace>, max_output_width: u32) -> (u32, u32) {
    let [tl, tr, br, bl] = quad.corners();
    let mut width = tl.distance(tr).max(bl.distance(br));
    let mut height = tl.distance(bl).max(tr.distance(br));

    let max_w = max_output_width as f64;
    if width > max_w {
        let s = max_w / width;
        width *= s;
        height *= s;
    }

    (
        (width.round() as u32).max(MIN_OUTPUT_SIDE),
        (height.round() as u32).max(MIN_OUTPUT_SIDE),
    )
}

/// Warp the region under `quad` (preview coordinates) out of `original`.
///
/// The quad is multiplied by `options.scale_factor`, re-ordered (drags may
/// have crossed corners), checked for collinear corners, and mapped to an
/// upright rectangle with a homography. Each output pixel is sampled
/// bilinearly through the inverse transform; positions outside the source
/// take `options.border`.
///
/// # Arguments
///
/// * `original` - Full-resolution capture
/// * `quad` - Document corners in preview pixels, in any order
/// * `options` - Preview-to-original scale, output width cap, border colour
///
/// # Returns
///
/// A raster of exactly the size [`target_dimensions`] reports for the
/// scaled, re-ordered quad.
///
/// # Errors
///
/// * `RectifyError::InvalidInput` - malformed source raster, non-positive
///   scale factor, or a zero width cap
/// * `RectifyError::Corner` - non-finite or duplicate corners
/// * `RectifyError::Collinear` - three corners on one line
/// * `RectifyError::NonInvertible` - the transform could not be solved
///
/// # Example
///
/// ```ignore
/// use snapscan_core::geometry::Quad;
/// use snapscan_core::raster::RasterImage;
/// use snapscan_core::rectify::{rectify, RectifyOptions};
///
/// let original = RasterImage::filled(2000, 1500, [200, 200, 200]);
/// let quad = Quad::rect(64.0, 64.0, 1216.0, 896.0);
/// let options = RectifyOptions { scale_factor: 2000.0 / 1280.0, ..Default::default() };
/// let flat = rectify(&original, &quad, &options)?;
/// assert_eq!(flat.width, 1600);
/// ```
#[instrument(
    skip(original, quad, options),
    fields(src_w = original.width, src_h = original.height)
)]
pub fn rectify(
    original: &RasterImage,
    quad: &Quad<PreviewSpace>,
    options: &RectifyOptions,
) -> Result<RasterImage, RectifyError> {
    original
        .validate()
        .map_err(|e| RectifyError::InvalidInput(e.to_string()))?;
    if !(options.scale_factor.is_finite() && options.scale_factor > 0.0) {
        return Err(RectifyError::InvalidInput(format!(
            "scale factor must be positive, got {}",
            options.scale_factor
        )));
    }
    if options.max_output_width == 0 {
        return Err(RectifyError::InvalidInput(
            "max output width must be non-zero".into(),
        ));
    }

    let scaled: Quad<OriginalSpace> = quad.scale_to(options.scale_factor);
    let ordered = order_corners(scaled.into_points())?;
    check_not_collinear(&ordered)?;

    let (width, height) = target_dimensions(&ordered, options.max_output_width);
    debug!(?ordered, width, height, "Rectify target computed");

    let (w, h) = (width as f64, height as f64);
    let src = ordered.corners().map(|p| p.to_array());
    let dst = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
    let forward = Homography::from_correspondences(&src, &dst)?;
    let inverse = forward.inverse()?;

    let output = warp::warp_perspective(original, &inverse, width, height, options.border);
    info!(width, height, "Document rectified");
    Ok(output)
}

fn check_not_collinear(quad: &Quad<OriginalSpace>) -> Result<(), RectifyError> {
    let c = quad.corners();
    for (a, b, d) in [(0, 1, 2), (1, 2, 3), (2, 3, 0), (3, 0, 1)] {
        if is_flat(&c[a], &c[b], &c[d]) {
            return Err(RectifyError::Collinear { a, b, c: d });
        }
    }
    Ok(())
}

/// True when the turn at `b` between `a` and `c` is (nearly) straight or folded back.
fn is_flat(
    a: &Point2D<OriginalSpace>,
    b: &Point2D<OriginalSpace>,
    c: &Point2D<OriginalSpace>,
) -> bool {
    let (ux, uy) = (a.x - b.x, a.y - b.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);
    let cross = (ux * vy - uy * vx).abs();
    let norms = ux.hypot(uy) * vx.hypot(vy);
    norms == 0.0 || cross <= COLLINEAR_SINE * norms
}
