//! Four-point homography solve.
//!
//! The eight unknowns of H (with `h33 = 1`) are solved exactly from four
//! correspondences after Hartley normalization of both point sets, which
//! keeps the 8×8 system well scaled for multi-megapixel coordinates.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomographyError {
    /// The linear system is singular: the source or destination corners do
    /// not span a proper quadrilateral.
    #[error("homography is singular for the given corners")]
    Singular,

    /// The solve produced NaN/inf or a matrix that cannot be inverted.
    #[error("homography is not invertible: {0}")]
    NotInvertible(String),
}

/// A 3×3 projective mapping `dst ~ H · src`.
#[derive(Debug, Clone, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the unique homography taking `src[i]` to `dst[i]` for i in 0..4.
    ///
    /// Both point sets are Hartley-normalized before the 8×8 system is
    /// solved, which keeps the LU decomposition well conditioned for
    /// coordinates in the thousands.
    ///
    /// # Errors
    ///
    /// `HomographyError::Singular` when three of the points on either side
    /// are collinear, `HomographyError::NotInvertible` when a normalization
    /// step degenerates.
    pub fn from_correspondences(
        src: &[[f64; 2]; 4],
        dst: &[[f64; 2]; 4],
    ) -> Result<Self, HomographyError> {
        let (t_src, src_n) = normalize(src);
        let (t_dst, dst_n) = normalize(dst);

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let [x, y] = src_n[i];
            let [u, v] = dst_n[i];
            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b).ok_or(HomographyError::Singular)?;
        let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or_else(|| HomographyError::NotInvertible("destination normalization".into()))?;
        let mut matrix = t_dst_inv * h_norm * t_src;

        let scale = matrix[(2, 2)];
        if !scale.is_finite() || scale.abs() < 1e-12 {
            return Err(HomographyError::NotInvertible(format!(
                "projective scale {scale}"
            )));
        }
        matrix /= scale;

        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::NotInvertible("non-finite entries".into()));
        }
        let det = matrix.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(HomographyError::NotInvertible(format!("determinant {det}")));
        }

        Ok(Self { matrix })
    }

    /// Map a point through H. Returns `None` when it lands on the line at infinity.
    pub fn apply(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p[2].abs() < 1e-15 {
            return None;
        }
        Some([p[0] / p[2], p[1] / p[2]])
    }

    /// The mapping from `dst` back to `src`, as the warp's sampler needs it.
    ///
    /// # Errors
    ///
    /// `HomographyError::NotInvertible` for a singular matrix.
    pub fn inverse(&self) -> Result<Self, HomographyError> {
        self.matrix
            .try_inverse()
            .map(|matrix| Self { matrix })
            .ok_or_else(|| HomographyError::NotInvertible("inverse".into()))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }
}

/// Translate the centroid to the origin and scale the mean distance to sqrt(2).
fn normalize(pts: &[[f64; 2]; 4]) -> (Matrix3<f64>, [[f64; 2]; 4]) {
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / 4.0;
    let mean_dist = pts
        .iter()
        .map(|p| (p[0] - cx).hypot(p[1] - cy))
        .sum::<f64>()
        / 4.0;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    (t, pts.map(|p| [s * (p[0] - cx), s * (p[1] - cy)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f64; 2], b: [f64; 2]) {
        assert!(
            (a[0] - b[0]).abs() < 1e-6 && (a[1] - b[1]).abs() < 1e-6,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn test_maps_keystoned_quad_to_rectangle() {
        let src = [[310.0, 120.0], [690.0, 130.0], [820.0, 910.0], [160.0, 905.0]];
        let dst = [[0.0, 0.0], [660.0, 0.0], [660.0, 790.0], [0.0, 790.0]];
        let h = Homography::from_correspondences(&src, &dst).unwrap();
        for i in 0..4 {
            assert_close(h.apply(src[i][0], src[i][1]).unwrap(), dst[i]);
        }
    }

    #[test]
    fn test_inverse_round_trips() {
        let src = [[12.0, 9.0], [400.0, 20.0], [390.0, 610.0], [5.0, 600.0]];
        let dst = [[0.0, 0.0], [400.0, 0.0], [400.0, 600.0], [0.0, 600.0]];
        let h = Homography::from_correspondences(&src, &dst).unwrap();
        let inv = h.inverse().unwrap();
        let mid = h.apply(200.0, 300.0).unwrap();
        assert_close(inv.apply(mid[0], mid[1]).unwrap(), [200.0, 300.0]);
    }

    #[test]
    fn test_identity_for_matching_sets() {
        let pts = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        let h = Homography::from_correspondences(&pts, &pts).unwrap();
        assert_close(h.apply(3.0, 7.0).unwrap(), [3.0, 7.0]);
    }

    #[test]
    fn test_collinear_source_is_rejected() {
        let src = [[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [30.0, 0.0]];
        let dst = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        assert!(Homography::from_correspondences(&src, &dst).is_err());
    }
}
