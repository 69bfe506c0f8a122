//! WASM bindings for corner ordering and rectification.

use crate::types::{quad_from_flat, JsRasterImage};
use snapscan_core::geometry::{order_corners as order_core, PreviewSpace, Quad};
use snapscan_core::rectify::{self, RectifyOptions};
use wasm_bindgen::prelude::*;

/// Put four points into top-left, top-right, bottom-right, bottom-left order.
///
/// Input and output are flat `[x0, y0, ..., x3, y3]` arrays.
#[wasm_bindgen]
pub fn order_corners(coords: &[f64]) -> Result<Vec<f64>, JsValue> {
    ordered_flat(coords).map_err(|e| JsValue::from_str(&e))
}

/// Warp the quad (given in preview coordinates) out of the original raster.
///
/// # Arguments
/// * `original` - Full-resolution capture
/// * `coords` - Flat quad corners in preview pixels, any order
/// * `scale_factor` - Original width divided by preview width
/// * `max_output_width` - Output width cap (1600 is typical)
#[wasm_bindgen]
pub fn rectify_quad(
    original: &JsRasterImage,
    coords: &[f64],
    scale_factor: f64,
    max_output_width: u32,
) -> Result<JsRasterImage, JsValue> {
    let quad = quad_from_flat(coords).map_err(|e| JsValue::from_str(&e))?;
    let raster = original
        .to_raster()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let options = RectifyOptions {
        scale_factor,
        max_output_width,
        ..RectifyOptions::default()
    };
    rectify::rectify(&raster, &quad, &options)
        .map(JsRasterImage::from_raster)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn ordered_flat(coords: &[f64]) -> Result<Vec<f64>, String> {
    let quad: Quad<PreviewSpace> = quad_from_flat(coords)?;
    let ordered = order_core(quad.into_points()).map_err(|e| e.to_string())?;
    Ok(ordered.to_flat().to_vec())
}
