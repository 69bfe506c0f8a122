//! Raster loading and resampling.
//!
//! Every stage exchanges the RGB [`RasterImage`]. Captures are decoded
//! upright via EXIF, then downscaled into a [`Preview`] whose
//! `scale_factor` maps preview coordinates back to the original.

mod load;
mod resize;
mod types;

pub use load::{load_raster, ExifOrientation};
pub use resize::{make_preview, resize, resize_to_width, Preview};
pub use types::{RasterError, RasterImage, Resampling};
