//! WASM bindings for quad detection.

use crate::types::{config_from_js, JsRasterImage};
use snapscan_core::config::ScanConfig;
use snapscan_core::detect;
use wasm_bindgen::prelude::*;

/// Detect the document quad on a preview raster.
///
/// # Arguments
/// * `image` - Preview raster
/// * `config` - Optional object with any `ScanConfig` fields in snake_case.
///   Detection reads `detect_strategy` (`"adaptive-threshold"` or
///   `"edges"`), `min_area_ratio`, `edge_threshold_low`/`edge_threshold_high`
///   (Canny hysteresis for `"edges"`), `threshold_block_size`,
///   `threshold_offset` and `morph_kernel_size`.
///
/// # Returns
/// Flat corner coordinates `[tlx, tly, trx, try, brx, bry, blx, bly]`, or
/// `undefined` when nothing qualifies.
///
/// # Example (JavaScript)
/// ```javascript
/// const quad = detect_quad(preview, {
///   detect_strategy: "edges",
///   edge_threshold_low: 20,
///   edge_threshold_high: 80,
/// });
/// ```
#[wasm_bindgen]
pub fn detect_quad(image: &JsRasterImage, config: JsValue) -> Result<Option<Vec<f64>>, JsValue> {
    let config = config_from_js(config)?;
    detect_with_config(image, &config).map_err(|e| JsValue::from_str(&e))
}

/// The full-frame fallback quad for a preview of the given size.
#[wasm_bindgen]
pub fn fallback_quad(width: u32, height: u32, inset: f64) -> Vec<f64> {
    detect::fallback_quad(width, height, inset).to_flat().to_vec()
}

fn detect_with_config(
    image: &JsRasterImage,
    config: &ScanConfig,
) -> Result<Option<Vec<f64>>, String> {
    config.validate().map_err(|e| e.to_string())?;
    let backend = config.backend().map_err(|e| e.to_string())?;
    let raster = image.to_raster().map_err(|e| e.to_string())?;
    Ok(detect::detect_quad(&backend, &raster, &config.detect_params())
        .map(|quad| quad.to_flat().to_vec()))
}
