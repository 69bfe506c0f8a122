//! Snapscan WASM - WebAssembly bindings for snapscan
//!
//! Exposes the snapscan-core capture pipeline to a browser UI.
//!
//! # Module Structure
//!
//! - `types` - WASM-compatible raster wrapper
//! - `session` - Stateful capture session (load, adjust, crop, encode)
//! - `detect` - One-shot quad detection
//! - `geometry` - Corner ordering and rectification
//! - `encode` - JPEG encoding, fixed quality or under a byte budget
//!
//! # Usage
//!
//! ```typescript
//! import init, { JsScanSession } from '@snapscan/wasm';
//!
//! await init();
//!
//! const session = new JsScanSession({ size_limit_kb: 300 });
//! const provenance = session.load_capture(new Uint8Array(await file.arrayBuffer()));
//! const crop = session.commit_crop();
//! const jpeg = session.encode();
//! console.log(session.summary());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use wasm_bindgen::prelude::*;

mod detect;
mod encode;
mod geometry;
mod session;
mod types;

pub use detect::{detect_quad, fallback_quad};
pub use encode::{encode_jpeg, encode_to_budget, BudgetReport, JsEncodedJpeg};
pub use geometry::{order_corners, rectify_quad};
pub use session::{JsEncodeJob, JsEncodeOutcome, JsScanSession};
pub use types::JsRasterImage;

static READY: AtomicBool = AtomicBool::new(false);

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    mark_ready();
    web_sys::console::log_1(&JsValue::from_str(&format!(
        "snapscan-wasm {} ready",
        version()
    )));
}

fn mark_ready() {
    READY.store(true, Ordering::Release);
}

/// Whether the module finished initializing. The UI keeps its capture
/// controls disabled until this is true.
#[wasm_bindgen]
pub fn is_ready() -> bool {
    READY.load(Ordering::Acquire)
}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
