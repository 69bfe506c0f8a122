//! Image-processing primitives consumed by the detector.
//!
//! Detection only needs a handful of raster operations. They sit behind
//! [`VisionBackend`] so the detector can be driven by a different engine or
//! by a test double; [`ImageprocBackend`] is the bundled implementation.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology;
use thiserror::Error;

use super::scratch::ScratchBuffers;
use crate::raster::RasterImage;

/// Failures raised by a vision backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The input raster has no pixels or an inconsistent buffer.
    #[error("backend received an empty or malformed raster ({width}x{height})")]
    InvalidInput { width: u32, height: u32 },

    /// A parameter is outside what the operation accepts.
    #[error("invalid backend parameter: {0}")]
    InvalidParameter(String),

    /// An intermediate buffer was expected in scratch storage but is missing.
    #[error("scratch buffer for stage '{0}' is missing")]
    MissingBuffer(&'static str),

    /// The operation itself failed.
    #[error("{stage} failed: {reason}")]
    Operation { stage: &'static str, reason: String },
}

/// Raster primitives the detector is built from.
///
/// Binary rasters use 255 for foreground and 0 for background.
pub trait VisionBackend {
    /// Luma conversion of an RGB raster.
    fn grayscale(&self, image: &RasterImage) -> Result<GrayImage, BackendError>;

    /// Locally adaptive binarization: a pixel brighter than its weighted
    /// neighbourhood mean (minus an offset) becomes 255.
    fn adaptive_threshold(&self, gray: &GrayImage) -> Result<GrayImage, BackendError>;

    fn invert(&self, binary: &GrayImage) -> Result<GrayImage, BackendError>;

    /// Dilate then erode with the backend's structuring element.
    fn morph_close(&self, binary: &GrayImage) -> Result<GrayImage, BackendError>;

    /// Erode then dilate with the backend's structuring element.
    fn morph_open(&self, binary: &GrayImage) -> Result<GrayImage, BackendError>;

    /// Edge map with hysteresis thresholds `low` <= `high`.
    fn edges(&self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage, BackendError>;

    /// Outer borders of top-level foreground regions, in the order their
    /// starting pixels are met in a raster scan. Holes and regions nested
    /// inside other regions are not returned.
    fn find_external_contours(&self, binary: &GrayImage)
        -> Result<Vec<Vec<[f64; 2]>>, BackendError>;

    /// Fresh scratch storage for one detection pass.
    fn new_scratch(&self) -> ScratchBuffers {
        ScratchBuffers::new()
    }
}

/// [`VisionBackend`] built on `image` and `imageproc`.
#[derive(Debug, Clone)]
pub struct ImageprocBackend {
    sigma: f32,
    offset: f32,
    kernel_radius: u8,
}

impl Default for ImageprocBackend {
    /// Block size 11 (sigma 2.0), offset 2, 5×5 square kernel.
    fn default() -> Self {
        Self {
            sigma: 2.0,
            offset: 2.0,
            kernel_radius: 2,
        }
    }
}

impl ImageprocBackend {
    /// Backend with an odd threshold `block_size` >= 3, threshold `offset`
    /// and a square morphology kernel of side `2 * kernel_radius + 1`.
    pub fn new(block_size: u32, offset: f32, kernel_radius: u8) -> Result<Self, BackendError> {
        if block_size < 3 || block_size % 2 == 0 {
            return Err(BackendError::InvalidParameter(format!(
                "block size must be odd and >= 3, got {block_size}"
            )));
        }
        if !offset.is_finite() {
            return Err(BackendError::InvalidParameter("offset must be finite".into()));
        }
        Ok(Self {
            sigma: sigma_for_block(block_size),
            offset,
            kernel_radius,
        })
    }
}

/// Gaussian sigma matching a square block of side `block_size`.
fn sigma_for_block(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn check_gray(image: &GrayImage) -> Result<(), BackendError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(BackendError::InvalidInput { width, height });
    }
    Ok(())
}

impl VisionBackend for ImageprocBackend {
    fn grayscale(&self, image: &RasterImage) -> Result<GrayImage, BackendError> {
        let invalid = BackendError::InvalidInput {
            width: image.width,
            height: image.height,
        };
        if image.is_empty() {
            return Err(invalid);
        }
        let view = image.as_rgb_view().ok_or(invalid)?;
        Ok(image::imageops::grayscale(&view))
    }

    fn adaptive_threshold(&self, gray: &GrayImage) -> Result<GrayImage, BackendError> {
        check_gray(gray)?;
        let (width, height) = gray.dimensions();
        let mean = gaussian_blur_f32(gray, self.sigma);
        let data = gray
            .as_raw()
            .iter()
            .zip(mean.as_raw())
            .map(|(&px, &m)| {
                if px as f32 > m as f32 - self.offset {
                    255
                } else {
                    0
                }
            })
            .collect();
        GrayImage::from_raw(width, height, data).ok_or(BackendError::Operation {
            stage: "adaptive_threshold",
            reason: "output buffer size mismatch".into(),
        })
    }

    fn invert(&self, binary: &GrayImage) -> Result<GrayImage, BackendError> {
        check_gray(binary)?;
        let mut out = binary.clone();
        image::imageops::invert(&mut out);
        Ok(out)
    }

    fn morph_close(&self, binary: &GrayImage) -> Result<GrayImage, BackendError> {
        check_gray(binary)?;
        Ok(morphology::close(binary, Norm::LInf, self.kernel_radius))
    }

    fn morph_open(&self, binary: &GrayImage) -> Result<GrayImage, BackendError> {
        check_gray(binary)?;
        Ok(morphology::open(binary, Norm::LInf, self.kernel_radius))
    }

    fn edges(&self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage, BackendError> {
        check_gray(gray)?;
        if !(low.is_finite() && high.is_finite()) || low < 0.0 || low > high {
            return Err(BackendError::InvalidParameter(format!(
                "edge thresholds must satisfy 0 <= low <= high, got {low}/{high}"
            )));
        }
        Ok(canny(gray, low, high))
    }

    fn find_external_contours(
        &self,
        binary: &GrayImage,
    ) -> Result<Vec<Vec<[f64; 2]>>, BackendError> {
        check_gray(binary)?;
        let contours = find_contours::<i32>(binary)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| {
                c.points
                    .into_iter()
                    .map(|p| [p.x as f64, p.y as f64])
                    .collect()
            })
            .collect();
        Ok(contours)
    }
}
