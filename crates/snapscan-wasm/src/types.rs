//! WASM-compatible wrapper types for raster data and quads.

use snapscan_core::config::ScanConfig;
use snapscan_core::geometry::{PreviewSpace, Quad};
use snapscan_core::raster::{RasterError, RasterImage};
use wasm_bindgen::prelude::*;

/// An RGB raster handed across the JS boundary.
///
/// # Memory Management
///
/// The pixel data lives in WASM memory. `pixels()` copies it out as a
/// `Uint8Array`, so keep the wrapper around and only extract when drawing.
#[wasm_bindgen]
pub struct JsRasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl JsRasterImage {
    /// Create a raster from dimensions and row-major RGB bytes.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> JsRasterImage {
        JsRasterImage {
            width,
            height,
            pixels,
        }
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[wasm_bindgen(getter)]
    pub fn byte_length(&self) -> usize {
        self.pixels.len()
    }

    /// Returns RGB pixel data as Uint8Array (a copy).
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// RGBA copy of the pixels, ready for `ImageData`.
    pub fn rgba_pixels(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() / 3 * 4);
        for rgb in self.pixels.chunks_exact(3) {
            out.extend_from_slice(rgb);
            out.push(255);
        }
        out
    }

    /// Explicitly free WASM memory.
    pub fn free(self) {}
}

impl JsRasterImage {
    pub(crate) fn from_raster(image: RasterImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            pixels: image.pixels,
        }
    }

    /// Validated core copy of this raster.
    pub(crate) fn to_raster(&self) -> Result<RasterImage, RasterError> {
        RasterImage::new(self.width, self.height, self.pixels.clone())
    }
}

/// Parse a flat `[x0, y0, x1, y1, x2, y2, x3, y3]` array into a quad.
pub(crate) fn quad_from_flat(coords: &[f64]) -> Result<Quad<PreviewSpace>, String> {
    let flat: [f64; 8] = coords
        .try_into()
        .map_err(|_| format!("expected 8 quad coordinates, got {}", coords.len()))?;
    Ok(Quad::from_flat(flat))
}

/// Read an optional JS config object. `undefined` and `null` give the
/// defaults; missing fields keep theirs.
pub(crate) fn config_from_js(value: JsValue) -> Result<ScanConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(ScanConfig::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}
