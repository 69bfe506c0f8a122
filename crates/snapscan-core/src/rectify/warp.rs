//! Inverse-mapped perspective warp with bilinear sampling.
//!
//! For each output pixel the inverse homography gives the source position,
//! which is sampled from its four neighbours. Positions outside the source
//! take a constant border colour.

use crate::geometry::Homography;
use crate::raster::RasterImage;

/// Render a `width` × `height` raster whose pixel (x, y) is `src` sampled at
/// `inverse(x, y)`.
pub(crate) fn warp_perspective(
    src: &RasterImage,
    inverse: &Homography,
    width: u32,
    height: u32,
    border: [u8; 3],
) -> RasterImage {
    let mut output = vec![0u8; width as usize * height as usize * 3];

    for (dst_y, row) in output.chunks_exact_mut(width as usize * 3).enumerate() {
        for (dst_x, out) in row.chunks_exact_mut(3).enumerate() {
            let pixel = match inverse.apply(dst_x as f64, dst_y as f64) {
                Some([sx, sy]) => sample_bilinear(src, sx, sy, border),
                None => border,
            };
            out.copy_from_slice(&pixel);
        }
    }

    RasterImage {
        width,
        height,
        pixels: output,
    }
}

/// Slack for positions that land on the source edge up to rounding error.
const EDGE_EPSILON: f64 = 1e-6;

/// Weighted mean of the four pixels around (x, y).
///
/// The last row and column are valid sample positions; their missing
/// neighbour is the pixel itself.
fn sample_bilinear(image: &RasterImage, x: f64, y: f64, border: [u8; 3]) -> [u8; 3] {
    let max_x = image.width as f64 - 1.0;
    let max_y = image.height as f64 - 1.0;
    let inside = x >= -EDGE_EPSILON
        && y >= -EDGE_EPSILON
        && x <= max_x + EDGE_EPSILON
        && y <= max_y + EDGE_EPSILON;
    if !inside {
        return border;
    }
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let x1 = (x0 + 1).min(image.width - 1);
    let y1 = (y0 + 1).min(image.height - 1);
    let (tx, ty) = (x - x0 as f64, y - y0 as f64);

    let top = lerp_rgb(image.pixel(x0, y0), image.pixel(x1, y0), tx);
    let bottom = lerp_rgb(image.pixel(x0, y1), image.pixel(x1, y1), tx);
    let mut out = [0u8; 3];
    for (c, (t, b)) in out.iter_mut().zip(top.iter().zip(bottom)) {
        *c = (t + (b - t) * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

fn lerp_rgb(a: [u8; 3], b: [u8; 3], t: f64) -> [f64; 3] {
    [0, 1, 2].map(|c| a[c] as f64 + (b[c] as f64 - a[c] as f64) * t)
}
