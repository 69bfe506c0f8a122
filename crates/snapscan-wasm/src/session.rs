//! WASM bindings for a capture session.
//!
//! A `JsScanSession` holds one capture at a time. The UI loads bytes, draws
//! `preview()` with `quad()` on top, forwards pointer events to `hit_test`
//! and `move_corner`, then calls `commit_crop` and `encode`.
//!
//! Encoding can also be split so the UI can yield between steps:
//!
//! ```typescript
//! const job = session.begin_encode();
//! await nextFrame();
//! const applied = session.finish_encode(job.run());
//! ```
//!
//! Only the most recent job writes back; `finish_encode` returns `false` for
//! one superseded by a newer job, capture, or crop.

use crate::types::{config_from_js, quad_from_flat, JsRasterImage};
use snapscan_core::config::ScanConfig;
use snapscan_core::encode::ImageJpegCodec;
use snapscan_core::session::{EncodeJob, EncodeOutcome, ScanSession, SessionError};
use wasm_bindgen::prelude::*;

fn session_err(e: SessionError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen]
pub struct JsScanSession {
    inner: ScanSession,
}

#[wasm_bindgen]
impl JsScanSession {
    /// Create a session. `config` is an optional object with any
    /// `ScanConfig` fields in snake_case; missing fields keep their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<JsScanSession, JsValue> {
        Self::from_config(config_from_js(config)?).map_err(session_err)
    }

    /// The effective configuration as a plain object.
    pub fn config(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.inner.config())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Decode captured bytes and detect the document.
    ///
    /// Returns `"detected"` or `"fallback"`.
    pub fn load_capture(&mut self, bytes: &[u8]) -> Result<String, JsValue> {
        self.inner
            .load_capture(bytes)
            .map(|p| p.as_str().to_string())
            .map_err(session_err)
    }

    /// Start a capture from an already-decoded raster.
    pub fn load_image(&mut self, image: &JsRasterImage) -> Result<String, JsValue> {
        let raster = image
            .to_raster()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.inner
            .set_capture(raster)
            .map(|p| p.as_str().to_string())
            .map_err(session_err)
    }

    /// The preview raster the quad is expressed in.
    pub fn preview(&self) -> Option<JsRasterImage> {
        self.inner
            .preview()
            .map(|p| JsRasterImage::from_raster(p.image.clone()))
    }

    /// Original width divided by preview width, or 1.0 with no capture.
    #[wasm_bindgen(getter)]
    pub fn scale_factor(&self) -> f64 {
        self.inner.preview().map_or(1.0, |p| p.scale_factor)
    }

    /// Working quad as `[x0, y0, ..., x3, y3]` in preview pixels.
    pub fn quad(&self) -> Option<Vec<f64>> {
        self.inner.quad().map(|q| q.to_flat().to_vec())
    }

    pub fn set_quad(&mut self, coords: &[f64]) -> Result<(), JsValue> {
        let quad = quad_from_flat(coords).map_err(|e| JsValue::from_str(&e))?;
        self.inner.set_quad(quad).map_err(session_err)
    }

    /// Drag corner `index` to (x, y). Returns the clamped `[x, y]`.
    pub fn move_corner(&mut self, index: usize, x: f64, y: f64) -> Result<Vec<f64>, JsValue> {
        self.inner
            .move_corner(index, x, y)
            .map(|p| p.to_array().to_vec())
            .map_err(session_err)
    }

    /// Index of the corner handle under (x, y), or -1.
    pub fn hit_test(&self, x: f64, y: f64) -> i32 {
        self.inner.hit_test(x, y).map_or(-1, |i| i as i32)
    }

    pub fn reset_quad(&mut self) -> Result<(), JsValue> {
        self.inner.reset_quad().map_err(session_err)
    }

    /// Rectify the working quad out of the original capture.
    pub fn commit_crop(&mut self) -> Result<JsRasterImage, JsValue> {
        self.inner
            .commit_crop()
            .map(|image| JsRasterImage::from_raster(image.clone()))
            .map_err(session_err)
    }

    #[wasm_bindgen(getter)]
    pub fn quality(&self) -> f32 {
        self.inner.quality()
    }

    pub fn set_quality(&mut self, quality: f32) -> Result<(), JsValue> {
        self.inner.set_quality(quality).map_err(session_err)
    }

    /// Encode the rectified image under the configured budget.
    pub fn encode(&mut self) -> Result<Vec<u8>, JsValue> {
        self.inner
            .encode()
            .map(|result| result.bytes.clone())
            .map_err(session_err)
    }

    /// Snapshot the rectified image for a deferred encode.
    pub fn begin_encode(&mut self) -> Result<JsEncodeJob, JsValue> {
        self.inner
            .begin_encode()
            .map(|job| JsEncodeJob { job })
            .map_err(session_err)
    }

    /// Apply a finished job. Returns `false` if it was superseded.
    pub fn finish_encode(&mut self, outcome: JsEncodeOutcome) -> bool {
        self.inner.finish_encode(outcome.outcome)
    }

    /// Bytes of the last applied encode.
    pub fn encoded_bytes(&self) -> Option<Vec<u8>> {
        self.inner.encoded().map(|r| r.bytes.clone())
    }

    /// `"Size: 412KB | Quality: 0.68 | Width: 1600px"`
    pub fn summary(&self) -> Option<String> {
        self.inner.summary().map(|s| s.to_string())
    }

    #[wasm_bindgen(getter)]
    pub fn status(&self) -> String {
        self.inner.status().to_string()
    }

    pub fn output_file_name(&self) -> String {
        self.inner.output_file_name().to_string()
    }
}

impl JsScanSession {
    pub(crate) fn from_config(config: ScanConfig) -> Result<Self, SessionError> {
        Ok(Self {
            inner: ScanSession::new(config)?,
        })
    }
}

/// A pending encode detached from its session.
#[wasm_bindgen]
pub struct JsEncodeJob {
    job: EncodeJob,
}

#[wasm_bindgen]
impl JsEncodeJob {
    #[wasm_bindgen(getter)]
    pub fn token(&self) -> f64 {
        self.job.token.value() as f64
    }

    /// Run the encode. Consumes the job.
    pub fn run(self) -> JsEncodeOutcome {
        JsEncodeOutcome {
            outcome: self.job.run(&ImageJpegCodec),
        }
    }
}

#[wasm_bindgen]
pub struct JsEncodeOutcome {
    outcome: EncodeOutcome,
}

#[wasm_bindgen]
impl JsEncodeOutcome {
    #[wasm_bindgen(getter)]
    pub fn succeeded(&self) -> bool {
        self.outcome.result.is_ok()
    }

    /// Error message of a failed encode.
    pub fn error(&self) -> Option<String> {
        self.outcome.result.as_ref().err().map(|e| e.to_string())
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_constructor_accepts_undefined_config() {
        let s = JsScanSession::new(JsValue::UNDEFINED).unwrap();
        assert_eq!(s.quality(), 0.75);
        assert!(s.config().is_ok());
    }

    #[wasm_bindgen_test]
    fn test_commit_without_capture_is_error() {
        let mut s = JsScanSession::new(JsValue::NULL).unwrap();
        assert!(s.commit_crop().is_err());
        assert!(s.encode().is_err());
    }

    #[wasm_bindgen_test]
    fn test_bad_capture_bytes_are_error() {
        let mut s = JsScanSession::new(JsValue::UNDEFINED).unwrap();
        assert!(s.load_capture(&[0, 1, 2, 3]).is_err());
        assert!(s.set_quad(&[1.0]).is_err());
    }
}
