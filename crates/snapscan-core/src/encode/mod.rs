//! JPEG output and the size-targeted encoding loop.

mod budget;
mod jpeg;

pub use budget::{
    encode_to_budget, EncodingParams, EncodingResult, ImageJpegCodec, JpegCodec, QUALITY_FLOOR,
    QUALITY_STEP, SHRINK_BELOW_QUALITY, SHRINK_FACTOR,
};
pub use jpeg::{encode_jpeg, jpeg_quality, EncodeError};
