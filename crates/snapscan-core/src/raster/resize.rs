//! Resizing for the processing preview and the encoder's shrink steps.

use tracing::debug;

use super::{RasterError, RasterImage, Resampling};

/// A downscaled working copy of a capture plus the factor that maps its
/// coordinates back to the original.
#[derive(Debug, Clone)]
pub struct Preview {
    /// The downscaled raster the detector and the corner editor work on.
    pub image: RasterImage,
    /// Original width divided by preview width (>= 1.0).
    pub scale_factor: f64,
}

/// Resample to exactly `width` x `height`. Same-size requests return a copy.
pub fn resize(
    image: &RasterImage,
    width: u32,
    height: u32,
    filter: Resampling,
) -> Result<RasterImage, RasterError> {
    if width == 0 || height == 0 {
        return Err(RasterError::InvalidDimensions { width, height });
    }

    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let view = image.as_rgb_view().ok_or(RasterError::BufferLength {
        expected: image.width as usize * image.height as usize * 3,
        actual: image.pixels.len(),
    })?;

    let resized = image::imageops::resize(&view, width, height, filter.image_filter());
    Ok(RasterImage::from_rgb_image(resized))
}

/// Resize so the width is at most `max_width`, preserving aspect ratio.
///
/// Images already narrow enough are returned unchanged (never upscaled).
pub fn resize_to_width(
    image: &RasterImage,
    max_width: u32,
    filter: Resampling,
) -> Result<RasterImage, RasterError> {
    if max_width == 0 {
        return Err(RasterError::InvalidDimensions {
            width: max_width,
            height: image.height,
        });
    }
    if image.width <= max_width {
        return Ok(image.clone());
    }
    let (width, height) = fit_width(image.width, image.height, max_width);
    resize(image, width, height, filter)
}

/// Build the processing preview for a capture.
///
/// # Arguments
///
/// * `original` - Full-resolution capture
/// * `preview_width` - Upper bound on the preview width
///
/// # Returns
///
/// The preview, never upscaled, and `scale_factor` =
/// `original.width / preview.width`, the factor the rectifier multiplies
/// preview-space coordinates by.
///
/// # Errors
///
/// `RasterError::InvalidDimensions` for a zero `preview_width` or an empty
/// capture, `RasterError::BufferLength` for a malformed one.
pub fn make_preview(original: &RasterImage, preview_width: u32) -> Result<Preview, RasterError> {
    original.validate()?;
    let image = resize_to_width(original, preview_width, Resampling::Triangle)?;
    let scale_factor = original.width as f64 / image.width as f64;
    debug!(
        original_width = original.width,
        preview_width = image.width,
        preview_height = image.height,
        scale_factor,
        "Preview generated"
    );
    Ok(Preview {
        image,
        scale_factor,
    })
}

/// Dimensions that cap `width` at `max_width` while preserving aspect ratio.
fn fit_width(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    if width <= max_width {
        return (width, height);
    }
    let new_height = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, new_height.max(1))
}
