//! Snapscan Core - receipt and document capture pipeline
//!
//! This crate finds a document quadrilateral in a photographed image, lets
//! a caller adjust it, rectifies the region to a flat rectangle, and
//! compresses the result to a byte budget.
//!
//! Pipeline: [`raster::load_raster`] → [`raster::make_preview`] →
//! [`detect::detect_quad`] → [`rectify::rectify`] →
//! [`encode::encode_to_budget`], with [`session::ScanSession`] tying the
//! stages to one capture.

pub mod config;
pub mod detect;
pub mod encode;
pub mod geometry;
pub mod raster;
pub mod rectify;
pub mod session;

pub use config::{ConfigError, ScanConfig};
pub use detect::{
    detect_or_fallback, detect_quad, BackendError, DetectParams, DetectStrategy, DetectionResult,
    ImageprocBackend, Provenance, VisionBackend,
};
pub use encode::{
    encode_to_budget, EncodeError, EncodingParams, EncodingResult, ImageJpegCodec, JpegCodec,
};
pub use geometry::{order_corners, CornerError, OriginalSpace, Point2D, PreviewSpace, Quad};
pub use raster::{load_raster, make_preview, Preview, RasterError, RasterImage};
pub use rectify::{rectify, target_dimensions, RectifyError, RectifyOptions};
pub use session::{
    EncodeJob, EncodeOutcome, EncodingSummary, RequestToken, ScanSession, SessionError,
    SessionStatus, OUTPUT_FILE_NAME,
};
