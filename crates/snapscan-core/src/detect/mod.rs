//! Document quadrilateral detection on the preview raster.
//!
//! The detector binarizes the preview, cleans the mask up with morphology,
//! and keeps the largest external contour that simplifies to four vertices
//! and covers more than a minimum share of the frame.

mod backend;
mod scratch;

pub use backend::{BackendError, ImageprocBackend, VisionBackend};
pub use scratch::{BufferId, ScratchBuffers, ScratchTracker};

use std::fmt;
use std::str::FromStr;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::geometry::{
    approximate_closed_polygon, closed_perimeter, order_corners, shoelace_area, Point2D,
    PreviewSpace, Quad,
};
use crate::raster::RasterImage;

/// Douglas–Peucker tolerance as a share of the contour perimeter.
pub const APPROX_EPSILON_RATIO: f64 = 0.02;

/// How the detector turns the preview into a foreground mask.
///
/// `AdaptiveThreshold` marks pixels darker than their neighbourhood, so a
/// plain step between paper and table yields a foreground ring only about
/// a third of the threshold block wide, on the dark side of the step. With
/// the default block of 11 that ring is 4 px and the 5×5 opening erases it:
/// a light receipt on a dark table without a printed border is not found
/// and the session falls back to the inset quad. Raise
/// `ScanConfig::threshold_block_size` to 21 (or shrink the morphology
/// kernel), or use `Edges`, for such captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectStrategy {
    /// Gaussian adaptive threshold, invert, close, open.
    #[default]
    AdaptiveThreshold,
    /// Canny edge map, close.
    Edges,
}

impl DetectStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectStrategy::AdaptiveThreshold => "adaptive-threshold",
            DetectStrategy::Edges => "edges",
        }
    }
}

impl fmt::Display for DetectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adaptive-threshold" => Ok(DetectStrategy::AdaptiveThreshold),
            "edges" => Ok(DetectStrategy::Edges),
            other => Err(format!(
                "unknown detection strategy '{other}' (expected adaptive-threshold or edges)"
            )),
        }
    }
}

/// Tuning knobs for [`detect_quad`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Lower hysteresis threshold for the edge strategy. Lower is more sensitive.
    pub edge_threshold_low: f32,
    /// Upper hysteresis threshold for the edge strategy.
    pub edge_threshold_high: f32,
    /// Contours must cover strictly more than this share of the image.
    pub min_area_ratio: f64,
    pub strategy: DetectStrategy,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            edge_threshold_low: 30.0,
            edge_threshold_high: 100.0,
            min_area_ratio: 0.08,
            strategy: DetectStrategy::AdaptiveThreshold,
        }
    }
}

/// Where a session's initial quad came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Detected,
    Fallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Detected => "detected",
            Provenance::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub quad: Quad<PreviewSpace>,
    pub provenance: Provenance,
}

/// Find the document quad in `image`, in canonical corner order.
///
/// # Arguments
///
/// * `backend` - Raster primitives; [`ImageprocBackend`] in production
/// * `image` - The preview raster
/// * `params` - Strategy, edge thresholds and minimum area share
///
/// # Returns
///
/// The largest qualifying quad, or `None` when no contour qualifies.
/// Backend failures are logged and also reported as `None`; every
/// intermediate raster is released before this returns.
///
/// # Example
///
/// ```ignore
/// use snapscan_core::detect::{detect_quad, DetectParams, ImageprocBackend};
///
/// let quad = detect_quad(&ImageprocBackend::default(), &preview, &DetectParams::default());
/// if let Some(quad) = quad {
///     println!("top-left at {:?}", quad.corners()[0]);
/// }
/// ```
#[instrument(
    skip(backend, image, params),
    fields(width = image.width, height = image.height, strategy = ?params.strategy)
)]
pub fn detect_quad<B>(
    backend: &B,
    image: &RasterImage,
    params: &DetectParams,
) -> Option<Quad<PreviewSpace>>
where
    B: VisionBackend + ?Sized,
{
    let mut scratch = backend.new_scratch();
    let contours = match foreground_contours(backend, image, params, &mut scratch) {
        Ok(contours) => contours,
        Err(e) => {
            warn!(error = %e, "Vision backend failed, no quad detected");
            return None;
        }
    };
    debug!(
        contours = contours.len(),
        scratch_buffers = scratch.len(),
        "External contours extracted"
    );

    let image_area = image.width as f64 * image.height as f64;
    let quad = select_candidate(&contours, image_area, params.min_area_ratio);
    match &quad {
        Some(q) => info!(quad = ?q, "Document quad detected"),
        None => info!("No qualifying quad"),
    }
    quad
}

/// [`detect_quad`], falling back to the full frame inset by `inset` pixels.
///
/// The result always carries a usable quad; its [`Provenance`] tells the
/// caller whether the user should be nudged to adjust the corners.
pub fn detect_or_fallback<B>(
    backend: &B,
    image: &RasterImage,
    params: &DetectParams,
    inset: f64,
) -> DetectionResult
where
    B: VisionBackend + ?Sized,
{
    match detect_quad(backend, image, params) {
        Some(quad) => DetectionResult {
            quad,
            provenance: Provenance::Detected,
        },
        None => {
            warn!(inset, "Falling back to full-frame corners");
            DetectionResult {
                quad: fallback_quad(image.width, image.height, inset),
                provenance: Provenance::Fallback,
            }
        }
    }
}

/// Full-frame quad inset by `inset` pixels on every side.
///
/// The inset is capped at a quarter of the shorter side so small previews
/// still get a quad with non-zero area.
pub fn fallback_quad(width: u32, height: u32, inset: f64) -> Quad<PreviewSpace> {
    let (w, h) = (width as f64, height as f64);
    let inset = inset.max(0.0).min(w.min(h) / 4.0);
    Quad::rect(inset, inset, w - inset, h - inset)
}

/// Pick the winning quad among external contours.
///
/// A contour qualifies when its raw area is strictly greater than
/// `min_area_ratio * image_area`, its Douglas–Peucker simplification has
/// exactly four vertices, and those vertices can be ordered. The largest
/// raw area wins; on a tie the earlier contour is kept.
///
/// # Arguments
///
/// * `contours` - Closed point lists in preview pixels, in backend order
/// * `image_area` - Preview width times height
/// * `min_area_ratio` - Exclusive lower bound on the area share
///
/// # Returns
///
/// The winner's corners in (TL, TR, BR, BL) order, or `None`.
pub fn select_candidate(
    contours: &[Vec<[f64; 2]>],
    image_area: f64,
    min_area_ratio: f64,
) -> Option<Quad<PreviewSpace>> {
    let min_area = min_area_ratio * image_area;
    let mut best: Option<(f64, Quad<PreviewSpace>)> = None;

    for (index, contour) in contours.iter().enumerate() {
        let area = shoelace_area(contour);
        if area <= min_area {
            continue;
        }
        let epsilon = APPROX_EPSILON_RATIO * closed_perimeter(contour);
        let polygon = approximate_closed_polygon(contour, epsilon);
        if polygon.len() != 4 {
            debug!(index, vertices = polygon.len(), area, "Contour is not a quad");
            continue;
        }
        let points = [0, 1, 2, 3].map(|i| Point2D::new(polygon[i][0], polygon[i][1]));
        let quad = match order_corners(points) {
            Ok(quad) => quad,
            Err(e) => {
                debug!(index, error = %e, "Skipping quad with unorderable corners");
                continue;
            }
        };
        if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
            best = Some((area, quad));
        }
    }

    best.map(|(_, quad)| quad)
}

/// Run the mask pipeline for `params.strategy`, parking every stage in `scratch`.
fn foreground_contours<B>(
    backend: &B,
    image: &RasterImage,
    params: &DetectParams,
    scratch: &mut ScratchBuffers,
) -> Result<Vec<Vec<[f64; 2]>>, BackendError>
where
    B: VisionBackend + ?Sized,
{
    let gray = scratch.keep(backend.grayscale(image)?);
    let mask = match params.strategy {
        DetectStrategy::AdaptiveThreshold => {
            let binary = stage(scratch, gray, "adaptive_threshold", |g| {
                backend.adaptive_threshold(g)
            })?;
            let inverted = stage(scratch, binary, "invert", |b| backend.invert(b))?;
            let closed = stage(scratch, inverted, "morph_close", |b| backend.morph_close(b))?;
            stage(scratch, closed, "morph_open", |b| backend.morph_open(b))?
        }
        DetectStrategy::Edges => {
            let edges = stage(scratch, gray, "edges", |g| {
                backend.edges(g, params.edge_threshold_low, params.edge_threshold_high)
            })?;
            stage(scratch, edges, "morph_close", |b| backend.morph_close(b))?
        }
    };
    let mask = scratch
        .get(mask)
        .ok_or(BackendError::MissingBuffer("contours"))?;
    backend.find_external_contours(mask)
}

fn stage(
    scratch: &mut ScratchBuffers,
    input: BufferId,
    name: &'static str,
    op: impl FnOnce(&GrayImage) -> Result<GrayImage, BackendError>,
) -> Result<BufferId, BackendError> {
    let output = op(scratch.get(input).ok_or(BackendError::MissingBuffer(name))?)?;
    Ok(scratch.keep(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// White page with a dark rectangular frame, like a receipt's printed border.
    fn framed(
        width: u32,
        height: u32,
        rect: (u32, u32, u32, u32),
        thickness: u32,
    ) -> RasterImage {
        let (left, top, right, bottom) = rect;
        let mut img = RasterImage::filled(width, height, [235, 235, 235]);
        for y in top..bottom {
            for x in left..right {
                let on_frame = x < left + thickness
                    || x >= right - thickness
                    || y < top + thickness
                    || y >= bottom - thickness;
                if on_frame {
                    let idx = ((y * width + x) * 3) as usize;
                    img.pixels[idx..idx + 3].copy_from_slice(&[25, 25, 25]);
                }
            }
        }
        img
    }

    /// Solid rectangle of level `inside` on a flat `outside` background.
    fn step_edge(
        width: u32,
        height: u32,
        rect: (u32, u32, u32, u32),
        inside: u8,
        outside: u8,
    ) -> RasterImage {
        let (left, top, right, bottom) = rect;
        let mut img = RasterImage::filled(width, height, [outside; 3]);
        for y in top..bottom {
            for x in left..right {
                let idx = ((y * width + x) * 3) as usize;
                img.pixels[idx..idx + 3].copy_from_slice(&[inside; 3]);
            }
        }
        img
    }

    const RECT: (u32, u32, u32, u32) = (60, 40, 340, 260);
    const RECT_CORNERS: [[f64; 2]; 4] =
        [[60.0, 40.0], [339.0, 40.0], [339.0, 259.0], [60.0, 259.0]];

    fn assert_corners_near(quad: &Quad<PreviewSpace>, tol: f64) {
        for (corner, expected) in quad.corners().iter().zip(RECT_CORNERS) {
            assert_near(corner.to_array(), expected, tol);
        }
    }

    fn square(left: f64, top: f64, side: f64) -> Vec<[f64; 2]> {
        vec![
            [left, top],
            [left + side, top],
            [left + side, top + side],
            [left, top + side],
        ]
    }

    fn assert_near(actual: [f64; 2], expected: [f64; 2], tol: f64) {
        assert!(
            (actual[0] - expected[0]).abs() <= tol && (actual[1] - expected[1]).abs() <= tol,
            "{:?} not within {} of {:?}",
            actual,
            tol,
            expected
        );
    }

    #[test]
    fn test_blank_image_has_no_quad() {
        let img = RasterImage::filled(200, 150, [255, 255, 255]);
        let quad = detect_quad(&ImageprocBackend::default(), &img, &DetectParams::default());
        assert!(quad.is_none());
    }

    #[test]
    fn test_detects_framed_document() {
        let img = framed(400, 300, (60, 40, 340, 260), 8);
        let quad = detect_quad(&ImageprocBackend::default(), &img, &DetectParams::default())
            .expect("frame should be detected");
        let c = quad.corners();
        assert_near(c[0].to_array(), [60.0, 40.0], 3.0);
        assert_near(c[1].to_array(), [339.0, 40.0], 3.0);
        assert_near(c[2].to_array(), [339.0, 259.0], 3.0);
        assert_near(c[3].to_array(), [60.0, 259.0], 3.0);
    }

    #[test]
    fn test_edges_finds_light_page_on_dark_table() {
        let img = step_edge(400, 300, RECT, 235, 40);
        let params = DetectParams {
            strategy: DetectStrategy::Edges,
            ..DetectParams::default()
        };
        let quad = detect_quad(&ImageprocBackend::default(), &img, &params)
            .expect("edge map should outline the page");
        assert_corners_near(&quad, 10.0);
    }

    #[test]
    fn test_edges_finds_dark_page_on_light_table() {
        let img = step_edge(400, 300, RECT, 40, 235);
        let params = DetectParams {
            strategy: DetectStrategy::Edges,
            ..DetectParams::default()
        };
        let quad = detect_quad(&ImageprocBackend::default(), &img, &params)
            .expect("edge map should outline the page");
        assert_corners_near(&quad, 10.0);
    }

    #[test]
    fn test_default_threshold_loses_plain_light_page() {
        // The 4 px ring left by block 11 does not survive the 5x5 opening.
        let img = step_edge(400, 300, RECT, 235, 40);
        let quad = detect_quad(&ImageprocBackend::default(), &img, &DetectParams::default());
        assert!(quad.is_none());
    }

    #[test]
    fn test_wide_threshold_block_finds_both_polarities() {
        let backend = ImageprocBackend::new(21, 2.0, 2).unwrap();
        for (inside, outside) in [(235, 40), (40, 235)] {
            let img = step_edge(400, 300, RECT, inside, outside);
            let quad = detect_quad(&backend, &img, &DetectParams::default())
                .unwrap_or_else(|| panic!("no quad for {inside} on {outside}"));
            assert_corners_near(&quad, 12.0);
        }
    }

    #[test]
    fn test_small_frame_is_rejected() {
        let img = framed(400, 300, (100, 100, 140, 130), 8);
        let quad = detect_quad(&ImageprocBackend::default(), &img, &DetectParams::default());
        assert!(quad.is_none());
    }

    #[test]
    fn test_fallback_on_blank_image() {
        let img = RasterImage::filled(200, 150, [255, 255, 255]);
        let result = detect_or_fallback(
            &ImageprocBackend::default(),
            &img,
            &DetectParams::default(),
            10.0,
        );
        assert_eq!(result.provenance, Provenance::Fallback);
        assert_eq!(
            result.quad.to_flat(),
            [10.0, 10.0, 190.0, 10.0, 190.0, 140.0, 10.0, 140.0]
        );
    }

    #[test]
    fn test_fallback_inset_shrinks_for_tiny_images() {
        let quad = fallback_quad(16, 12, 10.0);
        assert_eq!(quad.to_flat(), [3.0, 3.0, 13.0, 3.0, 13.0, 9.0, 3.0, 9.0]);
        assert!(quad.area() > 0.0);
    }

    #[test]
    fn test_area_exactly_at_ratio_is_rejected() {
        let contours = vec![square(0.0, 0.0, 10.0)];
        assert!(select_candidate(&contours, 1000.0, 0.1).is_none());
        assert!(select_candidate(&contours, 1000.0, 0.099).is_some());
    }

    #[test]
    fn test_largest_raw_area_wins() {
        let contours = vec![square(0.0, 0.0, 20.0), square(50.0, 50.0, 40.0)];
        let quad = select_candidate(&contours, 10_000.0, 0.01).unwrap();
        assert_eq!(quad.corners()[0].to_array(), [50.0, 50.0]);
    }

    #[test]
    fn test_tie_keeps_first_contour() {
        let contours = vec![square(100.0, 0.0, 30.0), square(0.0, 100.0, 30.0)];
        let quad = select_candidate(&contours, 10_000.0, 0.01).unwrap();
        assert_eq!(quad.corners()[0].to_array(), [100.0, 0.0]);
    }

    #[test]
    fn test_non_quad_contours_are_skipped() {
        let triangle = vec![[0.0, 0.0], [60.0, 0.0], [30.0, 50.0]];
        assert!(select_candidate(&[triangle], 1000.0, 0.01).is_none());
    }

    #[test]
    fn test_edges_strategy_on_blank_image() {
        let img = RasterImage::filled(120, 90, [40, 40, 40]);
        let params = DetectParams {
            strategy: DetectStrategy::Edges,
            ..DetectParams::default()
        };
        assert!(detect_quad(&ImageprocBackend::default(), &img, &params).is_none());
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&DetectStrategy::AdaptiveThreshold).unwrap();
        assert_eq!(json, "\"adaptive-threshold\"");
        let parsed: DetectStrategy = serde_json::from_str("\"edges\"").unwrap();
        assert_eq!(parsed, DetectStrategy::Edges);
    }

    #[test]
    fn test_strategy_from_str_matches_serde() {
        for strategy in [DetectStrategy::AdaptiveThreshold, DetectStrategy::Edges] {
            assert_eq!(strategy.as_str().parse::<DetectStrategy>(), Ok(strategy));
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{strategy}\""));
        }
        assert!("hough".parse::<DetectStrategy>().is_err());
    }

    /// Delegates to the bundled backend but fails at one named stage.
    struct FailingBackend {
        inner: ImageprocBackend,
        fail_at: &'static str,
        tracker: ScratchTracker,
    }

    impl FailingBackend {
        fn check(&self, stage: &'static str) -> Result<(), BackendError> {
            if self.fail_at == stage {
                return Err(BackendError::Operation {
                    stage,
                    reason: "injected".into(),
                });
            }
            Ok(())
        }
    }

    impl VisionBackend for FailingBackend {
        fn grayscale(&self, image: &RasterImage) -> Result<GrayImage, BackendError> {
            self.check("grayscale")?;
            self.inner.grayscale(image)
        }
        fn adaptive_threshold(&self, gray: &GrayImage) -> Result<GrayImage, BackendError> {
            self.check("adaptive_threshold")?;
            self.inner.adaptive_threshold(gray)
        }
        fn invert(&self, binary: &GrayImage) -> Result<GrayImage, BackendError> {
            self.check("invert")?;
            self.inner.invert(binary)
        }
        fn morph_close(&self, binary: &GrayImage) -> Result<GrayImage, BackendError> {
            self.check("morph_close")?;
            self.inner.morph_close(binary)
        }
        fn morph_open(&self, binary: &GrayImage) -> Result<GrayImage, BackendError> {
            self.check("morph_open")?;
            self.inner.morph_open(binary)
        }
        fn edges(&self, gray: &GrayImage, low: f32, high: f32) -> Result<GrayImage, BackendError> {
            self.check("edges")?;
            self.inner.edges(gray, low, high)
        }
        fn find_external_contours(
            &self,
            binary: &GrayImage,
        ) -> Result<Vec<Vec<[f64; 2]>>, BackendError> {
            self.check("contours")?;
            self.inner.find_external_contours(binary)
        }
        fn new_scratch(&self) -> ScratchBuffers {
            ScratchBuffers::tracked(self.tracker.clone())
        }
    }

    #[test]
    fn test_backend_failure_releases_scratch_buffers() {
        let img = framed(200, 150, (20, 20, 180, 130), 8);
        for fail_at in ["morph_close", "morph_open", "contours"] {
            let backend = FailingBackend {
                inner: ImageprocBackend::default(),
                fail_at,
                tracker: ScratchTracker::new(),
            };
            assert!(detect_quad(&backend, &img, &DetectParams::default()).is_none());
            assert_eq!(backend.tracker.live(), 0, "leak after failing at {fail_at}");
            assert!(backend.tracker.total() > 0);
        }
    }

    #[test]
    fn test_success_releases_scratch_buffers() {
        let backend = FailingBackend {
            inner: ImageprocBackend::default(),
            fail_at: "none",
            tracker: ScratchTracker::new(),
        };
        let img = framed(400, 300, (60, 40, 340, 260), 8);
        assert!(detect_quad(&backend, &img, &DetectParams::default()).is_some());
        assert_eq!(backend.tracker.total(), 5);
        assert_eq!(backend.tracker.live(), 0);
    }

    #[test]
    fn test_mask_pixels_are_binary() {
        let backend = ImageprocBackend::default();
        let img = framed(100, 80, (10, 10, 90, 70), 6);
        let gray = backend.grayscale(&img).unwrap();
        let binary = backend.adaptive_threshold(&gray).unwrap();
        let closed = backend.morph_close(&backend.invert(&binary).unwrap()).unwrap();
        let mask = backend.morph_open(&closed).unwrap();
        assert!(mask.pixels().all(|p| *p == Luma([0]) || *p == Luma([255])));
    }
}
