//! JPEG encoding of rectified rasters.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::raster::{RasterError, RasterImage};

#[derive(Debug, Error)]
pub enum EncodeError {
    /// The input raster, or a shrink step between attempts, is unusable.
    #[error("cannot encode raster: {0}")]
    Raster(#[from] RasterError),

    #[error("invalid encoding parameter: {0}")]
    InvalidParameter(String),

    #[error("JPEG codec failed: {0}")]
    Codec(String),
}

/// Map a 0.0..=1.0 quality to the encoder's 1..=100 scale.
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Encode a raster to baseline JPEG bytes.
///
/// # Arguments
///
/// * `image` - RGB raster; its buffer must hold `width * height * 3` bytes
/// * `quality` - 0.0..=1.0, mapped through [`jpeg_quality`]
///
/// # Returns
///
/// A complete JPEG file, starting with `FF D8` and ending with `FF D9`.
///
/// # Errors
///
/// * `EncodeError::Raster` - zero-sized raster or a mismatched buffer
/// * `EncodeError::Codec` - the encoder rejected the image
///
/// # Quality Guidelines
///
/// - 0.9-1.0: archival, large files
/// - 0.75: the capture default, receipts stay legible
/// - below 0.5: the budget loop shrinks the raster instead of going lower
///
/// # Example
///
/// ```ignore
/// use snapscan_core::encode::encode_jpeg;
/// use snapscan_core::raster::RasterImage;
///
/// let page = RasterImage::filled(640, 480, [250, 250, 250]);
/// let jpeg = encode_jpeg(&page, 0.75)?;
/// std::fs::write("receipt.jpg", jpeg)?;
/// ```
pub fn encode_jpeg(image: &RasterImage, quality: f32) -> Result<Vec<u8>, EncodeError> {
    image.validate()?;
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
        .write_image(
            &image.pixels,
            image.width,
            image.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| EncodeError::Codec(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RasterImage {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x * 255 / width) as u8);
                pixels.push((y * 255 / height) as u8);
                pixels.push(((x * 7 + y * 13) % 256) as u8);
            }
        }
        RasterImage::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_encode_jpeg_markers() {
        let jpeg = encode_jpeg(&RasterImage::filled(100, 100, [128, 128, 128]), 0.9).unwrap();
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(jpeg_quality(0.75), 75);
        assert_eq!(jpeg_quality(0.68), 68);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(1.7), 100);
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let img = gradient(120, 90);
        let high = encode_jpeg(&img, 0.95).unwrap();
        let low = encode_jpeg(&img, 0.2).unwrap();
        assert!(low.len() < high.len(), "low={} high={}", low.len(), high.len());
    }

    #[test]
    fn test_mismatched_buffer_rejected() {
        let img = RasterImage {
            width: 10,
            height: 10,
            pixels: vec![0; 299],
        };
        assert!(matches!(
            encode_jpeg(&img, 0.8),
            Err(EncodeError::Raster(RasterError::BufferLength {
                expected: 300,
                actual: 299
            }))
        ));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let img = RasterImage {
            width: 0,
            height: 10,
            pixels: vec![],
        };
        assert!(matches!(
            encode_jpeg(&img, 0.8),
            Err(EncodeError::Raster(RasterError::InvalidDimensions { .. }))
        ));
    }
}
