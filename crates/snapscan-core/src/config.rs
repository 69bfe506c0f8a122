//! Tunable settings for a scan session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detect::{BackendError, DetectParams, DetectStrategy, ImageprocBackend};
use crate::encode::EncodingParams;
use crate::rectify::RectifyOptions;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("edge thresholds must satisfy 0 <= low <= high, got {low}/{high}")]
    EdgeThresholds { low: f32, high: f32 },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Every knob of the capture pipeline. Missing fields take their defaults
/// when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Processing preview width; larger captures are downscaled to this.
    pub preview_width: u32,
    pub edge_threshold_low: f32,
    pub edge_threshold_high: f32,
    /// Minimum share of the preview a document contour must exceed.
    pub min_area_ratio: f64,
    /// Starting JPEG quality, 0.0..=1.0.
    pub jpeg_quality: f32,
    /// Output byte budget in KiB.
    pub size_limit_kb: u32,
    pub max_output_width: u32,
    pub max_encode_iterations: u32,
    pub min_encode_width: u32,
    /// Inset of the full-frame fallback quad, in preview pixels.
    pub fallback_inset: f64,
    /// Corner handle hit radius, in preview pixels.
    pub handle_radius: f64,
    pub detect_strategy: DetectStrategy,
    /// Side of the adaptive threshold neighbourhood, odd and >= 3.
    ///
    /// A step edge leaves a foreground ring about `block / 3` pixels wide,
    /// and the opening erases rings narrower than `morph_kernel_size`. The
    /// default pair (11, 5) favours documents with a border or printed
    /// frame; 21 keeps plain light paper on a dark table.
    pub threshold_block_size: u32,
    pub threshold_offset: f32,
    /// Side of the square close/open kernel, odd, 1..=31.
    pub morph_kernel_size: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            preview_width: 1280,
            edge_threshold_low: 30.0,
            edge_threshold_high: 100.0,
            min_area_ratio: 0.08,
            jpeg_quality: 0.75,
            size_limit_kb: 500,
            max_output_width: 1600,
            max_encode_iterations: 12,
            min_encode_width: 320,
            fallback_inset: 10.0,
            handle_radius: 12.0,
            detect_strategy: DetectStrategy::AdaptiveThreshold,
            threshold_block_size: 11,
            threshold_offset: 2.0,
            morph_kernel_size: 5,
        }
    }
}

fn out_of_range(
    field: &'static str,
    value: impl ToString,
    expected: &'static str,
) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        value: value.to_string(),
        expected,
    }
}

impl ScanConfig {
    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// * `ConfigError::EdgeThresholds` - thresholds not `0 <= low <= high`
    /// * `ConfigError::OutOfRange` - any other field outside its range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preview_width == 0 {
            return Err(out_of_range("preview_width", self.preview_width, "> 0"));
        }
        let (low, high) = (self.edge_threshold_low, self.edge_threshold_high);
        if !(low.is_finite() && high.is_finite()) || low < 0.0 || low > high {
            return Err(ConfigError::EdgeThresholds { low, high });
        }
        if !(0.0..1.0).contains(&self.min_area_ratio) {
            return Err(out_of_range("min_area_ratio", self.min_area_ratio, "0.0..1.0"));
        }
        if !(0.0..=1.0).contains(&self.jpeg_quality) {
            return Err(out_of_range("jpeg_quality", self.jpeg_quality, "0.0..=1.0"));
        }
        if self.size_limit_kb == 0 {
            return Err(out_of_range("size_limit_kb", self.size_limit_kb, "> 0"));
        }
        if self.max_output_width == 0 {
            return Err(out_of_range("max_output_width", self.max_output_width, "> 0"));
        }
        if self.min_encode_width == 0 || self.min_encode_width > self.max_output_width {
            return Err(out_of_range(
                "min_encode_width",
                self.min_encode_width,
                "1..=max_output_width",
            ));
        }
        if !(self.fallback_inset.is_finite() && self.fallback_inset >= 0.0) {
            return Err(out_of_range("fallback_inset", self.fallback_inset, ">= 0"));
        }
        if !(self.handle_radius.is_finite() && self.handle_radius > 0.0) {
            return Err(out_of_range("handle_radius", self.handle_radius, "> 0"));
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(out_of_range(
                "threshold_block_size",
                self.threshold_block_size,
                "odd, >= 3",
            ));
        }
        if !self.threshold_offset.is_finite() {
            return Err(out_of_range("threshold_offset", self.threshold_offset, "finite"));
        }
        if !(1..=31).contains(&self.morph_kernel_size) || self.morph_kernel_size % 2 == 0 {
            return Err(out_of_range(
                "morph_kernel_size",
                self.morph_kernel_size,
                "odd, 1..=31",
            ));
        }
        Ok(())
    }

    /// The bundled vision backend tuned by the threshold and morphology knobs.
    ///
    /// # Errors
    ///
    /// `ConfigError::Backend` when the block size or offset is unusable.
    pub fn backend(&self) -> Result<ImageprocBackend, ConfigError> {
        let kernel_radius = (self.morph_kernel_size.min(31) / 2) as u8;
        Ok(ImageprocBackend::new(
            self.threshold_block_size,
            self.threshold_offset,
            kernel_radius,
        )?)
    }

    pub fn detect_params(&self) -> DetectParams {
        DetectParams {
            edge_threshold_low: self.edge_threshold_low,
            edge_threshold_high: self.edge_threshold_high,
            min_area_ratio: self.min_area_ratio,
            strategy: self.detect_strategy,
        }
    }

    /// Rectify options for a preview scaled down by `scale_factor`.
    pub fn rectify_options(&self, scale_factor: f64) -> RectifyOptions {
        RectifyOptions {
            scale_factor,
            max_output_width: self.max_output_width,
            ..RectifyOptions::default()
        }
    }

    /// Encoding parameters starting at `quality`.
    pub fn encoding_params(&self, quality: f32) -> EncodingParams {
        EncodingParams {
            quality,
            target_bytes: self.size_limit_kb as usize * 1024,
            max_width: self.max_output_width,
            max_iterations: self.max_encode_iterations,
            min_width: self.min_encode_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.encoding_params(0.75).target_bytes, 512_000);
        assert_eq!(config.detect_params(), DetectParams::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"size_limit_kb": 200, "detect_strategy": "edges"}"#).unwrap();
        assert_eq!(config.size_limit_kb, 200);
        assert_eq!(config.detect_strategy, DetectStrategy::Edges);
        assert_eq!(config.preview_width, 1280);
        assert!((config.jpeg_quality - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let parsed = serde_json::from_str::<ScanConfig>(r#"{"detect_strategy": "hough"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = ScanConfig {
            edge_threshold_low: 120.0,
            ..ScanConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EdgeThresholds { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        let cases = [
            ScanConfig {
                jpeg_quality: 1.2,
                ..ScanConfig::default()
            },
            ScanConfig {
                min_area_ratio: 1.0,
                ..ScanConfig::default()
            },
            ScanConfig {
                size_limit_kb: 0,
                ..ScanConfig::default()
            },
            ScanConfig {
                min_encode_width: 2000,
                ..ScanConfig::default()
            },
            ScanConfig {
                handle_radius: 0.0,
                ..ScanConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::OutOfRange { .. })),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_threshold_knobs_deserialize_and_validate() {
        let config: ScanConfig = serde_json::from_str(
            r#"{"threshold_block_size": 21, "threshold_offset": 4.0, "morph_kernel_size": 3}"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.threshold_block_size, 21);
        assert_eq!(config.morph_kernel_size, 3);
        assert!(config.backend().is_ok());

        for (block, kernel) in [(10, 5), (1, 5), (11, 4), (11, 33), (11, 0)] {
            let config = ScanConfig {
                threshold_block_size: block,
                morph_kernel_size: kernel,
                ..ScanConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::OutOfRange { .. })),
                "{block}/{kernel}"
            );
        }
    }

    #[test]
    fn test_backend_rejects_even_block() {
        let config = ScanConfig {
            threshold_block_size: 8,
            ..ScanConfig::default()
        };
        assert!(matches!(
            config.backend(),
            Err(ConfigError::Backend(BackendError::InvalidParameter(_)))
        ));
    }

    #[test]
    fn test_rectify_options_carry_scale() {
        let opts = ScanConfig::default().rectify_options(1.5625);
        assert_eq!(opts.max_output_width, 1600);
        assert!((opts.scale_factor - 1.5625).abs() < 1e-12);
    }
}
