//! Size-targeted encoding.
//!
//! The encoder first trades quality for size in fixed steps, then, once
//! quality is at or below 0.5, shrinks the raster by 10% per attempt. It
//! stops as soon as an attempt fits the byte budget or the attempt cap is
//! reached, and always returns the last attempt.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::jpeg::{encode_jpeg, EncodeError};
use crate::raster::{resize, RasterImage, Resampling};

/// Quality drop per attempt while quality is above [`SHRINK_BELOW_QUALITY`].
pub const QUALITY_STEP: f32 = 0.07;
/// Quality never drops below this.
pub const QUALITY_FLOOR: f32 = 0.4;
/// At or below this quality, attempts shrink the raster instead.
pub const SHRINK_BELOW_QUALITY: f32 = 0.5;
/// Width multiplier per shrink step.
pub const SHRINK_FACTOR: f64 = 0.9;

/// The codec seam of the budget loop.
pub trait JpegCodec {
    /// Encode `image` at `quality` in 0.0..=1.0.
    fn encode(&self, image: &RasterImage, quality: f32) -> Result<Vec<u8>, EncodeError>;
}

/// [`JpegCodec`] backed by the `image` crate's baseline JPEG encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageJpegCodec;

impl JpegCodec for ImageJpegCodec {
    fn encode(&self, image: &RasterImage, quality: f32) -> Result<Vec<u8>, EncodeError> {
        encode_jpeg(image, quality)
    }
}

/// Inputs of [`encode_to_budget`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodingParams {
    /// Starting quality, 0.0..=1.0.
    pub quality: f32,
    /// Byte budget for the encoded output.
    pub target_bytes: usize,
    /// Shrink steps never produce a wider raster than this.
    pub max_width: u32,
    /// Cap on codec calls; 0 is treated as 1.
    pub max_iterations: u32,
    /// Shrink steps stop at this width.
    pub min_width: u32,
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self {
            quality: 0.75,
            target_bytes: 500 * 1024,
            max_width: 1600,
            max_iterations: 12,
            min_width: 320,
        }
    }
}

/// The last attempt of [`encode_to_budget`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingResult {
    pub bytes: Vec<u8>,
    pub achieved_size: usize,
    pub achieved_quality: f32,
    pub width: u32,
    pub height: u32,
    pub codec_calls: u32,
    /// False when the attempt cap or the width floor was hit first.
    pub budget_met: bool,
}

/// Encode `image`, lowering quality and then resolution until the output
/// fits `params.target_bytes`.
///
/// # Arguments
///
/// * `codec` - The encoder; [`ImageJpegCodec`] in production
/// * `image` - The rectified document
/// * `params` - Starting quality, byte budget, width bounds and attempt cap
///
/// # Returns
///
/// The last attempt. Codec calls never exceed `max(params.max_iterations, 1)`.
///
/// Shrink steps stop at `params.min_width` (320 px by default). Once the
/// raster is at that floor and still too large, the loop ends before the
/// attempt cap and returns a best-effort result with `budget_met == false`
/// whose `achieved_size` exceeds `target_bytes`. Callers that need a hard
/// size guarantee must check `budget_met`, or lower `min_width`.
///
/// # Errors
///
/// * `EncodeError::InvalidParameter` - quality outside 0.0..=1.0, or a zero
///   width bound
/// * `EncodeError::Raster` / `EncodeError::Codec` - from a resize step or
///   the codec
///
/// # Example
///
/// ```ignore
/// use snapscan_core::encode::{encode_to_budget, EncodingParams, ImageJpegCodec};
///
/// let result = encode_to_budget(&ImageJpegCodec, &document, &EncodingParams::default())?;
/// if !result.budget_met {
///     eprintln!("{} bytes, over budget", result.achieved_size);
/// }
/// ```
#[instrument(
    skip(codec, image, params),
    fields(width = image.width, height = image.height, target_bytes = params.target_bytes)
)]
pub fn encode_to_budget<C>(
    codec: &C,
    image: &RasterImage,
    params: &EncodingParams,
) -> Result<EncodingResult, EncodeError>
where
    C: JpegCodec + ?Sized,
{
    validate(params)?;
    let max_calls = params.max_iterations.max(1);

    let mut quality = params.quality;
    let mut working: Cow<'_, RasterImage> = Cow::Borrowed(image);
    let mut bytes = codec.encode(&working, quality)?;
    let mut calls = 1;
    debug!(attempt = calls, quality, width = working.width, size = bytes.len(), "Encoded");

    while bytes.len() > params.target_bytes && calls < max_calls {
        if quality > SHRINK_BELOW_QUALITY {
            quality = (quality - QUALITY_STEP).max(QUALITY_FLOOR);
        } else {
            let Some((new_w, new_h)) = shrink_dimensions(working.width, working.height, params)
            else {
                debug!(width = working.width, "At minimum width, stopping");
                break;
            };
            working = Cow::Owned(resize(&working, new_w, new_h, Resampling::Triangle)?);
        }
        bytes = codec.encode(&working, quality)?;
        calls += 1;
        debug!(attempt = calls, quality, width = working.width, size = bytes.len(), "Encoded");
    }

    let budget_met = bytes.len() <= params.target_bytes;
    if budget_met {
        info!(size = bytes.len(), quality, width = working.width, calls, "Budget met");
    } else {
        warn!(
            size = bytes.len(),
            quality,
            width = working.width,
            calls,
            "Budget not met, returning best effort"
        );
    }

    Ok(EncodingResult {
        achieved_size: bytes.len(),
        bytes,
        achieved_quality: quality,
        width: working.width,
        height: working.height,
        codec_calls: calls,
        budget_met,
    })
}

fn validate(params: &EncodingParams) -> Result<(), EncodeError> {
    if !(0.0..=1.0).contains(&params.quality) {
        return Err(EncodeError::InvalidParameter(format!(
            "quality must be within 0.0..=1.0, got {}",
            params.quality
        )));
    }
    if params.max_width == 0 || params.min_width == 0 {
        return Err(EncodeError::InvalidParameter(
            "max_width and min_width must be non-zero".into(),
        ));
    }
    Ok(())
}

/// Next shrink step: 90% of the current width, held to
/// `min_width..=max_width`, height from the current aspect ratio. `None`
/// when that would not make the raster narrower.
fn shrink_dimensions(width: u32, height: u32, params: &EncodingParams) -> Option<(u32, u32)> {
    let target = (width as f64 * SHRINK_FACTOR).round() as u32;
    let new_w = target.max(params.min_width).min(params.max_width);
    if new_w >= width || new_w == 0 {
        return None;
    }
    let new_h = ((height as f64 * new_w as f64 / width as f64).round() as u32).max(1);
    Some((new_w, new_h))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    struct SizeByArea;

    impl JpegCodec for SizeByArea {
        fn encode(&self, image: &RasterImage, quality: f32) -> Result<Vec<u8>, EncodeError> {
            Ok(vec![0; (quality as f64 * image.pixel_count() as f64 / 4.0) as usize])
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: the call cap holds and quality never rises across attempts.
        #[test]
        fn prop_cap_and_monotone_quality(
            width in 320u32..640,
            height in 40u32..400,
            quality in 0.3f32..=1.0,
            target in 0usize..60_000,
            cap in 0u32..15,
        ) {
            let img = RasterImage::filled(width, height, [0, 0, 0]);
            let p = EncodingParams {
                quality,
                target_bytes: target,
                max_iterations: cap,
                ..EncodingParams::default()
            };
            let result = encode_to_budget(&SizeByArea, &img, &p).unwrap();
            prop_assert!(result.codec_calls <= cap.max(1));
            prop_assert!(result.achieved_quality <= quality);
            prop_assert!(result.achieved_quality >= QUALITY_FLOOR.min(quality));
            prop_assert!(result.width <= width);
            prop_assert_eq!(result.budget_met, result.achieved_size <= target);
        }
    }
}
