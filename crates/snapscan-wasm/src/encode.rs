//! WASM bindings for JPEG encoding.

use crate::types::JsRasterImage;
use serde::{Deserialize, Serialize};
use snapscan_core::encode::{self, EncodingParams, EncodingResult, ImageJpegCodec};
use wasm_bindgen::prelude::*;

/// Encode a raster as JPEG at a fixed quality (0.0 to 1.0).
#[wasm_bindgen]
pub fn encode_jpeg(image: &JsRasterImage, quality: f32) -> Result<Vec<u8>, JsValue> {
    let raster = image
        .to_raster()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    encode::encode_jpeg(&raster, quality).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Metadata of a budgeted encode, returned alongside the bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    pub achieved_size: usize,
    pub achieved_quality: f32,
    pub width: u32,
    pub height: u32,
    pub codec_calls: u32,
    pub budget_met: bool,
}

impl From<&EncodingResult> for BudgetReport {
    fn from(result: &EncodingResult) -> Self {
        Self {
            achieved_size: result.achieved_size,
            achieved_quality: result.achieved_quality,
            width: result.width,
            height: result.height,
            codec_calls: result.codec_calls,
            budget_met: result.budget_met,
        }
    }
}

/// Result of [`encode_to_budget`]: the JPEG bytes and how they were reached.
#[wasm_bindgen]
pub struct JsEncodedJpeg {
    bytes: Vec<u8>,
    report: BudgetReport,
}

#[wasm_bindgen]
impl JsEncodedJpeg {
    /// JPEG bytes as Uint8Array (a copy).
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// `{ achieved_size, achieved_quality, width, height, codec_calls, budget_met }`
    pub fn report(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.report).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(getter)]
    pub fn budget_met(&self) -> bool {
        self.report.budget_met
    }
}

impl JsEncodedJpeg {
    pub(crate) fn from_result(result: EncodingResult) -> Self {
        let report = BudgetReport::from(&result);
        Self {
            bytes: result.bytes,
            report,
        }
    }
}

/// Encode a raster under a byte budget.
///
/// `params` is an optional object with any of `quality`, `target_bytes`,
/// `max_width`, `max_iterations` and `min_width`; missing fields keep their
/// defaults (0.75, 512000, 1600, 12, 320).
#[wasm_bindgen]
pub fn encode_to_budget(image: &JsRasterImage, params: JsValue) -> Result<JsEncodedJpeg, JsValue> {
    let params = if params.is_undefined() || params.is_null() {
        EncodingParams::default()
    } else {
        let partial: PartialEncodingParams = serde_wasm_bindgen::from_value(params)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        partial.into_params()
    };
    let raster = image
        .to_raster()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    encode::encode_to_budget(&ImageJpegCodec, &raster, &params)
        .map(JsEncodedJpeg::from_result)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct PartialEncodingParams {
    quality: Option<f32>,
    target_bytes: Option<usize>,
    max_width: Option<u32>,
    max_iterations: Option<u32>,
    min_width: Option<u32>,
}

impl PartialEncodingParams {
    fn into_params(self) -> EncodingParams {
        let d = EncodingParams::default();
        EncodingParams {
            quality: self.quality.unwrap_or(d.quality),
            target_bytes: self.target_bytes.unwrap_or(d.target_bytes),
            max_width: self.max_width.unwrap_or(d.max_width),
            max_iterations: self.max_iterations.unwrap_or(d.max_iterations),
            min_width: self.min_width.unwrap_or(d.min_width),
        }
    }
}
