//! Raster loading with EXIF orientation handling.
//!
//! Phone cameras store photos in sensor orientation and record the intended
//! rotation in EXIF, so the loader applies it before anything measures pixels.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};
use tracing::{debug, instrument};

use super::{RasterError, RasterImage};

/// The EXIF orientation tag, 1 through 8. Anything else reads as upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExifOrientation(u8);

impl ExifOrientation {
    pub const UPRIGHT: Self = Self(1);

    pub fn from_tag(value: u32) -> Self {
        match value {
            1..=8 => Self(value as u8),
            _ => Self::UPRIGHT,
        }
    }

    /// Read the tag from an image container. Missing or unreadable EXIF is upright.
    pub fn read(bytes: &[u8]) -> Self {
        Reader::new()
            .read_from_container(&mut Cursor::new(bytes))
            .ok()
            .and_then(|exif| {
                exif.get_field(Tag::Orientation, In::PRIMARY)
                    .and_then(|field| field.value.get_uint(0))
            })
            .map_or(Self::UPRIGHT, Self::from_tag)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether displaying the image swaps its width and height.
    pub fn swaps_axes(self) -> bool {
        self.0 >= 5
    }

    /// Turn a decoded image the way the tag says it should be displayed.
    fn apply(self, img: DynamicImage) -> DynamicImage {
        match self.0 {
            2 => img.fliph(),
            3 => img.rotate180(),
            4 => img.flipv(),
            5 => img.rotate90().fliph(),
            6 => img.rotate90(),
            7 => img.rotate270().fliph(),
            8 => img.rotate270(),
            _ => img,
        }
    }
}

/// Decode JPEG or PNG bytes into an upright RGB raster.
///
/// # Arguments
///
/// * `bytes` - The encoded file as captured or picked by the user
///
/// # Returns
///
/// The decoded raster with its EXIF orientation applied, so a portrait
/// photo stored landscape comes back portrait.
///
/// # Errors
///
/// `RasterError::UnknownFormat` for empty input, `RasterError::Decode` when
/// the decoder rejects the bytes.
///
/// # Example
///
/// ```ignore
/// use snapscan_core::raster::load_raster;
///
/// let bytes = std::fs::read("capture.jpg")?;
/// let raster = load_raster(&bytes)?;
/// println!("{}x{}", raster.width, raster.height);
/// ```
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn load_raster(bytes: &[u8]) -> Result<RasterImage, RasterError> {
    if bytes.is_empty() {
        return Err(RasterError::UnknownFormat);
    }
    let orientation = ExifOrientation::read(bytes);
    let decoded = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RasterError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| RasterError::Decode(e.to_string()))?;

    let raster = RasterImage::from_rgb_image(orientation.apply(decoded).into_rgb8());
    debug!(
        width = raster.width,
        height = raster.height,
        orientation = orientation.value(),
        "Raster loaded"
    );
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    fn png_bytes(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(pixels, width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn red_green() -> DynamicImage {
        DynamicImage::ImageRgb8(
            image::RgbImage::from_raw(2, 1, vec![255, 0, 0, 0, 255, 0]).unwrap(),
        )
    }

    #[test]
    fn test_load_png() {
        let pixels = vec![
            255, 0, 0, 0, 255, 0, //
            0, 0, 255, 255, 255, 0,
        ];
        let img = load_raster(&png_bytes(2, 2, &pixels)).unwrap();
        assert_eq!((img.width, img.height), (2, 2));
        assert_eq!(img.pixels, pixels);
    }

    #[test]
    fn test_load_encoded_jpeg() {
        let src = RasterImage::filled(16, 8, [120, 120, 120]);
        let jpeg = crate::encode::encode_jpeg(&src, 0.9).unwrap();
        let img = load_raster(&jpeg).unwrap();
        assert_eq!((img.width, img.height), (16, 8));
    }

    #[test]
    fn test_load_invalid_bytes() {
        let result = load_raster(&[0x00, 0x01, 0x02, 0x03]);
        assert!(matches!(result, Err(RasterError::Decode(_))));
    }

    #[test]
    fn test_load_empty_bytes() {
        assert!(matches!(load_raster(&[]), Err(RasterError::UnknownFormat)));
    }

    #[test]
    fn test_missing_exif_reads_upright() {
        let bytes = png_bytes(1, 1, &[1, 2, 3]);
        assert_eq!(ExifOrientation::read(&bytes), ExifOrientation::UPRIGHT);
        assert_eq!(ExifOrientation::read(&[0x00, 0x01]), ExifOrientation::UPRIGHT);
    }

    #[test]
    fn test_out_of_range_tag_is_upright() {
        assert_eq!(ExifOrientation::from_tag(0), ExifOrientation::UPRIGHT);
        assert_eq!(ExifOrientation::from_tag(9), ExifOrientation::UPRIGHT);
        assert_eq!(ExifOrientation::from_tag(6).value(), 6);
    }

    #[test]
    fn test_quarter_turns_swap_axes() {
        let turned = ExifOrientation::from_tag(6).apply(red_green());
        assert_eq!(turned.into_rgb8().dimensions(), (1, 2));
        assert!(ExifOrientation::from_tag(8).swaps_axes());
        assert!(!ExifOrientation::from_tag(3).swaps_axes());
    }

    #[test]
    fn test_half_turn_reverses_row() {
        let rgb = ExifOrientation::from_tag(3).apply(red_green()).into_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 0]);
    }
}
