//! Core raster types shared by every pipeline stage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    /// Empty input, or bytes no decoder recognizes.
    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("failed to decode image: {0}")]
    Decode(String),

    /// A zero width or height, given or requested.
    #[error("invalid raster size {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("pixel buffer holds {actual} bytes, {expected} expected for RGB")]
    BufferLength { expected: usize, actual: usize },
}

/// Resampling kernel for resize steps.
///
/// Previews and encoder shrink steps use `Triangle`; the others are there
/// for callers trading speed against sharpness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    Nearest,
    #[default]
    Triangle,
    Lanczos3,
}

impl Resampling {
    pub(crate) fn image_filter(self) -> image::imageops::FilterType {
        match self {
            Resampling::Nearest => image::imageops::FilterType::Nearest,
            Resampling::Triangle => image::imageops::FilterType::Triangle,
            Resampling::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// An RGB raster in row-major order, 3 bytes per pixel.
///
/// This is the only image representation that crosses module boundaries:
/// the loader produces it, the detector reads it, the rectifier and the
/// encoder both consume and produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Length `width * height * 3`.
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// Validates the buffer length against the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        let image = Self {
            width,
            height,
            pixels,
        };
        image.validate()?;
        Ok(image)
    }

    /// Non-zero size and a buffer of exactly `width * height * 3` bytes.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.width as usize * self.height as usize * 3;
        if self.pixels.len() != expected {
            return Err(RasterError::BufferLength {
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }

    /// A raster of one solid colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Zero-copy `image` view, `None` if the buffer length is off.
    pub fn as_rgb_view(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        image::ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice())
    }

    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// RGB at (x, y), or `None` outside the raster or past a short buffer.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels
            .get(idx..idx + 3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
    }

    /// Unchecked RGB read for inner loops over a validated raster.
    ///
    /// # Panics
    ///
    /// Panics when (x, y) lies outside the raster or the buffer is shorter
    /// than `width * height * 3`. Call [`RasterImage::validate`] first.
    #[inline]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True for a zero-sized raster or an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }
}
