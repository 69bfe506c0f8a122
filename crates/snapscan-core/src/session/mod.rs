//! The capture → detect → adjust → crop → encode lifecycle.
//!
//! A [`ScanSession`] holds one capture at a time: the original raster, its
//! preview, the working quad the user edits, the last rectified document
//! and the last accepted encoding. Encodes are split into
//! [`ScanSession::begin_encode`] and [`ScanSession::finish_encode`] so the
//! heavy part can run elsewhere; only the most recent request may write
//! its result back.

mod token;

pub use token::RequestToken;

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, ScanConfig};
use crate::detect::{detect_or_fallback, ImageprocBackend, Provenance, VisionBackend};
use crate::encode::{
    encode_to_budget, EncodeError, EncodingParams, EncodingResult, ImageJpegCodec, JpegCodec,
};
use crate::geometry::{CornerError, Point2D, PreviewSpace, Quad};
use crate::raster::{load_raster, make_preview, Preview, RasterError, RasterImage};
use crate::rectify::{rectify, RectifyError};
use token::TokenCounter;

/// File name offered for the encoded document.
pub const OUTPUT_FILE_NAME: &str = "receipt.jpg";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Rectify(#[from] RectifyError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid quad: {0}")]
    Corner(#[from] CornerError),

    #[error("no capture loaded")]
    NoCapture,

    #[error("no cropped document; commit a crop first")]
    NotCropped,

    #[error("corner index {0} is out of range (0..4)")]
    CornerIndex(usize),

    #[error("quality {0} is outside 0.0..=1.0")]
    Quality(f32),
}

/// Where the session is in the capture lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Idle,
    /// A quad was detected and is ready to adjust or crop.
    Detected,
    /// Detection failed; the fallback quad needs manual adjustment.
    NeedsAdjustment,
    Cropped,
    Encoding,
    Encoded,
    /// The last crop or encode failed; the quad is untouched.
    Failed(String),
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => f.write_str("idle"),
            SessionStatus::Detected => f.write_str("detected"),
            SessionStatus::NeedsAdjustment => f.write_str("needs-adjustment"),
            SessionStatus::Cropped => f.write_str("cropped"),
            SessionStatus::Encoding => f.write_str("encoding"),
            SessionStatus::Encoded => f.write_str("encoded"),
            SessionStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Display figures for an encoded document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingSummary {
    /// Encoded size in KiB, rounded to nearest.
    pub size_kb: u64,
    pub quality: f32,
    pub width: u32,
}

impl From<&EncodingResult> for EncodingSummary {
    fn from(result: &EncodingResult) -> Self {
        Self {
            size_kb: (result.achieved_size as f64 / 1024.0).round() as u64,
            quality: result.achieved_quality,
            width: result.width,
        }
    }
}

impl fmt::Display for EncodingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Size: {}KB | Quality: {:.2} | Width: {}px",
            self.size_kb, self.quality, self.width
        )
    }
}

/// A self-contained encode request, safe to move to another thread.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub token: RequestToken,
    pub image: RasterImage,
    pub params: EncodingParams,
}

impl EncodeJob {
    /// Run the budget loop. Errors are carried in the outcome so they
    /// reach the session through [`ScanSession::finish_encode`].
    pub fn run<C>(self, codec: &C) -> EncodeOutcome
    where
        C: JpegCodec + ?Sized,
    {
        let result = encode_to_budget(codec, &self.image, &self.params);
        EncodeOutcome {
            token: self.token,
            result,
        }
    }
}

/// The result of an [`EncodeJob`], to hand back to [`ScanSession::finish_encode`].
#[derive(Debug)]
pub struct EncodeOutcome {
    pub token: RequestToken,
    pub result: Result<EncodingResult, EncodeError>,
}

#[derive(Debug)]
struct Capture {
    original: RasterImage,
    preview: Preview,
    quad: Quad<PreviewSpace>,
    /// What `reset_quad` restores: the detected quad, then the last committed one.
    baseline: Quad<PreviewSpace>,
    provenance: Provenance,
    rectified: Option<RasterImage>,
    encoded: Option<EncodingResult>,
}

/// One capture's worth of pipeline state.
pub struct ScanSession<B = ImageprocBackend, C = ImageJpegCodec> {
    config: ScanConfig,
    backend: B,
    codec: C,
    quality: f32,
    capture: Option<Capture>,
    status: SessionStatus,
    tokens: TokenCounter,
}

impl ScanSession {
    /// Session with the bundled codec and a backend built from the
    /// config's threshold and morphology settings.
    ///
    /// # Errors
    ///
    /// `SessionError::Config` when the config fails validation.
    pub fn new(config: ScanConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let backend = config.backend()?;
        Self::with_parts(config, backend, ImageJpegCodec)
    }
}

impl<B, C> ScanSession<B, C>
where
    B: VisionBackend,
    C: JpegCodec,
{
    pub fn with_parts(config: ScanConfig, backend: B, codec: C) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            quality: config.jpeg_quality,
            config,
            backend,
            codec,
            capture: None,
            status: SessionStatus::Idle,
            tokens: TokenCounter::default(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Decode image bytes and start a new capture with them.
    pub fn load_capture(&mut self, bytes: &[u8]) -> Result<Provenance, SessionError> {
        let original = load_raster(bytes)?;
        self.set_capture(original)
    }

    /// Start a new capture: build the preview and detect (or fall back to)
    /// the initial quad. Outstanding encodes become stale.
    ///
    /// # Returns
    ///
    /// Whether the initial quad was detected or is the inset fallback.
    ///
    /// # Errors
    ///
    /// `SessionError::Raster` when the capture is empty or malformed. The
    /// previous capture is kept in that case.
    #[instrument(
        skip(self, original),
        fields(width = original.width, height = original.height)
    )]
    pub fn set_capture(&mut self, original: RasterImage) -> Result<Provenance, SessionError> {
        let preview = make_preview(&original, self.config.preview_width)?;
        let detection = detect_or_fallback(
            &self.backend,
            &preview.image,
            &self.config.detect_params(),
            self.config.fallback_inset,
        );

        self.tokens.invalidate();
        self.status = match detection.provenance {
            Provenance::Detected => SessionStatus::Detected,
            Provenance::Fallback => SessionStatus::NeedsAdjustment,
        };
        info!(provenance = ?detection.provenance, status = %self.status, "Capture ready");

        self.capture = Some(Capture {
            original,
            preview,
            quad: detection.quad,
            baseline: detection.quad,
            provenance: detection.provenance,
            rectified: None,
            encoded: None,
        });
        Ok(detection.provenance)
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.capture.as_ref().map(|c| &c.preview)
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.capture.as_ref().map(|c| c.provenance)
    }

    pub fn quad(&self) -> Option<&Quad<PreviewSpace>> {
        self.capture.as_ref().map(|c| &c.quad)
    }

    /// Replace the working quad. Corner order is kept as given.
    pub fn set_quad(&mut self, quad: Quad<PreviewSpace>) -> Result<(), SessionError> {
        let capture = self.capture.as_mut().ok_or(SessionError::NoCapture)?;
        if let Some(index) = quad.corners().iter().position(|p| !p.is_finite()) {
            return Err(CornerError::NonFinite { index }.into());
        }
        capture.quad = quad;
        Ok(())
    }

    /// Move one corner, clamped to the preview bounds.
    ///
    /// # Arguments
    ///
    /// * `index` - 0..4 in quad order (TL, TR, BR, BL)
    /// * `x`, `y` - Drag position in preview pixels
    ///
    /// # Returns
    ///
    /// Where the corner landed after clamping.
    ///
    /// # Errors
    ///
    /// `SessionError::NoCapture`, `SessionError::CornerIndex` for an index
    /// past 3, or `SessionError::Corner` for a non-finite position.
    pub fn move_corner(
        &mut self,
        index: usize,
        x: f64,
        y: f64,
    ) -> Result<Point2D<PreviewSpace>, SessionError> {
        let capture = self.capture.as_mut().ok_or(SessionError::NoCapture)?;
        if index >= 4 {
            return Err(SessionError::CornerIndex(index));
        }
        if !(x.is_finite() && y.is_finite()) {
            return Err(CornerError::NonFinite { index }.into());
        }
        let width = capture.preview.image.width as f64;
        let height = capture.preview.image.height as f64;
        let point = Point2D::new(x.clamp(0.0, width), y.clamp(0.0, height));
        capture.quad.corners_mut()[index] = point;
        Ok(point)
    }

    /// Index of the first corner within the handle radius of (x, y).
    pub fn hit_test(&self, x: f64, y: f64) -> Option<usize> {
        let quad = self.quad()?;
        let pointer = Point2D::new(x, y);
        quad.corners()
            .iter()
            .position(|c| c.distance(&pointer) <= self.config.handle_radius)
    }

    /// Restore the detected quad, or the last committed one after a crop.
    pub fn reset_quad(&mut self) -> Result<(), SessionError> {
        let capture = self.capture.as_mut().ok_or(SessionError::NoCapture)?;
        capture.quad = capture.baseline;
        Ok(())
    }

    /// Rectify the working quad out of the original capture.
    ///
    /// # Returns
    ///
    /// The rectified document. The committed quad becomes what
    /// [`ScanSession::reset_quad`] restores, and any earlier encoding is
    /// discarded.
    ///
    /// # Errors
    ///
    /// * `SessionError::NoCapture` - nothing loaded yet
    /// * `SessionError::Rectify` - degenerate quad; the session is marked
    ///   failed and the quad is left as it was so it can be adjusted and
    ///   committed again
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut session = ScanSession::new(ScanConfig::default())?;
    /// session.load_capture(&std::fs::read("capture.jpg")?)?;
    /// session.move_corner(0, 40.0, 32.0)?;
    /// let page = session.commit_crop()?;
    /// println!("{}x{}", page.width, page.height);
    /// ```
    #[instrument(skip(self))]
    pub fn commit_crop(&mut self) -> Result<&RasterImage, SessionError> {
        let capture = self.capture.as_mut().ok_or(SessionError::NoCapture)?;
        let options = self.config.rectify_options(capture.preview.scale_factor);

        match rectify(&capture.original, &capture.quad, &options) {
            Ok(rectified) => {
                capture.baseline = capture.quad;
                capture.encoded = None;
                self.tokens.invalidate();
                self.status = SessionStatus::Cropped;
                Ok(capture.rectified.insert(rectified))
            }
            Err(e) => {
                warn!(error = %e, "Crop failed");
                self.status = SessionStatus::Failed(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn rectified(&self) -> Option<&RasterImage> {
        self.capture.as_ref().and_then(|c| c.rectified.as_ref())
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Starting quality for subsequent encodes.
    pub fn set_quality(&mut self, quality: f32) -> Result<(), SessionError> {
        if !(0.0..=1.0).contains(&quality) {
            return Err(SessionError::Quality(quality));
        }
        self.quality = quality;
        Ok(())
    }

    /// Issue a new encode request for the current rectified document.
    /// Any earlier request becomes stale.
    ///
    /// # Errors
    ///
    /// `SessionError::NotCropped` until a crop has been committed.
    pub fn begin_encode(&mut self) -> Result<EncodeJob, SessionError> {
        let image = self
            .rectified()
            .ok_or(SessionError::NotCropped)?
            .clone();
        let token = self.tokens.issue();
        self.status = SessionStatus::Encoding;
        debug!(token = token.value(), quality = self.quality, "Encode requested");
        Ok(EncodeJob {
            token,
            image,
            params: self.config.encoding_params(self.quality),
        })
    }

    /// Write an encode outcome back if it answers the latest request.
    ///
    /// Returns `false`, leaving the session untouched, for stale outcomes.
    pub fn finish_encode(&mut self, outcome: EncodeOutcome) -> bool {
        if !self.tokens.is_latest(outcome.token) {
            warn!(token = outcome.token.value(), "Dropping stale encode result");
            return false;
        }
        match outcome.result {
            Ok(result) => {
                info!(summary = %EncodingSummary::from(&result), "Encode accepted");
                if let Some(capture) = self.capture.as_mut() {
                    capture.encoded = Some(result);
                }
                self.status = SessionStatus::Encoded;
            }
            Err(e) => {
                warn!(error = %e, "Encode failed");
                self.status = SessionStatus::Failed(e.to_string());
            }
        }
        true
    }

    /// Encode on the calling thread with the session's codec.
    pub fn encode(&mut self) -> Result<&EncodingResult, SessionError> {
        let job = self.begin_encode()?;
        let EncodeOutcome { token, result } = job.run(&self.codec);
        match result {
            Ok(result) => {
                self.finish_encode(EncodeOutcome {
                    token,
                    result: Ok(result),
                });
                self.encoded().ok_or(SessionError::NotCropped)
            }
            Err(e) => {
                self.status = SessionStatus::Failed(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn encoded(&self) -> Option<&EncodingResult> {
        self.capture.as_ref().and_then(|c| c.encoded.as_ref())
    }

    pub fn summary(&self) -> Option<EncodingSummary> {
        self.encoded().map(EncodingSummary::from)
    }

    pub fn output_file_name(&self) -> &'static str {
        OUTPUT_FILE_NAME
    }
}
