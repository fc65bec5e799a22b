//! Pinhole camera with Brown–Conrady / rational lens distortion.
//!
//! Coefficients follow the OpenCV order `(k1, k2, p1, p2[, k3[, k4, k5, k6]])`
//! so calibration files written by OpenCV tooling load unchanged.

use crate::CameraError;
use nalgebra::{Matrix3, Point2, Vector3};

const UNDISTORT_ITERATIONS: usize = 30;
// Squared step length in normalized coordinates.
const UNDISTORT_EPS: f64 = 1e-24;

/// Lens distortion coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
}

impl Distortion {
    /// Parse an OpenCV-ordered coefficient vector of length 0, 4, 5 or 8.
    pub fn from_coeffs(c: &[f64]) -> Result<Self, CameraError> {
        if !matches!(c.len(), 0 | 4 | 5 | 8) {
            return Err(CameraError::InvalidDistortion(c.len()));
        }
        if c.iter().any(|v| !v.is_finite()) {
            return Err(CameraError::InvalidDistortion(c.len()));
        }
        let at = |i: usize| c.get(i).copied().unwrap_or(0.0);
        Ok(Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
            k4: at(5),
            k5: at(6),
            k6: at(7),
        })
    }

    pub fn to_coeffs(&self) -> [f64; 8] {
        [
            self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6,
        ]
    }

    pub fn is_zero(&self) -> bool {
        self.to_coeffs().iter().all(|&v| v == 0.0)
    }

    #[inline]
    fn radial(&self, r2: f64) -> f64 {
        let num = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let den = 1.0 + r2 * (self.k4 + r2 * (self.k5 + r2 * self.k6));
        num / den
    }

    #[inline]
    fn tangential(&self, x: f64, y: f64, r2: f64) -> (f64, f64) {
        (
            2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x),
            self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y,
        )
    }

    /// Distort ideal normalized coordinates.
    pub fn distort(&self, p: Point2<f64>) -> Point2<f64> {
        let r2 = p.x * p.x + p.y * p.y;
        let radial = self.radial(r2);
        let (dx, dy) = self.tangential(p.x, p.y, r2);
        Point2::new(p.x * radial + dx, p.y * radial + dy)
    }

    /// Invert [`Self::distort`] by fixed-point iteration.
    pub fn undistort(&self, pd: Point2<f64>) -> Option<Point2<f64>> {
        if self.is_zero() {
            return Some(pd);
        }
        let mut p = pd;
        for _ in 0..UNDISTORT_ITERATIONS {
            let r2 = p.x * p.x + p.y * p.y;
            let radial = self.radial(r2);
            if !radial.is_finite() || radial <= 0.0 {
                return None;
            }
            let (dx, dy) = self.tangential(p.x, p.y, r2);
            let next = Point2::new((pd.x - dx) / radial, (pd.y - dy) / radial);
            let step = (next - p).norm_squared();
            p = next;
            if step < UNDISTORT_EPS {
                break;
            }
        }
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }
}

/// Intrinsic matrix plus distortion; immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraModel {
    k: Matrix3<f64>,
    k_inv: Matrix3<f64>,
    distortion: Distortion,
}

impl CameraModel {
    /// Build from a 3×3 intrinsic matrix `[[fx, s, cx], [0, fy, cy], [0, 0, 1]]`.
    pub fn new(k: Matrix3<f64>, distortion: Distortion) -> Result<Self, CameraError> {
        if k.iter().any(|v| !v.is_finite()) {
            return Err(CameraError::InvalidIntrinsics("non-finite entry".into()));
        }
        if k[(0, 0)] <= 0.0 || k[(1, 1)] <= 0.0 {
            return Err(CameraError::InvalidIntrinsics(format!(
                "focal lengths must be positive (fx={}, fy={})",
                k[(0, 0)],
                k[(1, 1)]
            )));
        }
        if k[(1, 0)] != 0.0 || k[(2, 0)] != 0.0 || k[(2, 1)] != 0.0 || k[(2, 2)] != 1.0 {
            return Err(CameraError::InvalidIntrinsics(
                "expected [[fx, s, cx], [0, fy, cy], [0, 0, 1]]".into(),
            ));
        }
        let k_inv = k
            .try_inverse()
            .ok_or_else(|| CameraError::InvalidIntrinsics("singular matrix".into()))?;
        Ok(Self {
            k,
            k_inv,
            distortion,
        })
    }

    /// Distortion-free camera.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraError> {
        Self::new(
            Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            Distortion::default(),
        )
    }

    pub fn from_rows(rows: [[f64; 3]; 3], coeffs: &[f64]) -> Result<Self, CameraError> {
        let k = Matrix3::from_fn(|r, c| rows[r][c]);
        Self::new(k, Distortion::from_coeffs(coeffs)?)
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.k
    }

    #[inline]
    pub fn distortion(&self) -> &Distortion {
        &self.distortion
    }

    /// Pixel to undistorted normalized image coordinates.
    pub fn normalize(&self, px: Point2<f64>) -> Result<Point2<f64>, CameraError> {
        let v = self.k_inv * Vector3::new(px.x, px.y, 1.0);
        let pd = Point2::new(v.x / v.z, v.y / v.z);
        self.distortion
            .undistort(pd)
            .ok_or(CameraError::UndistortFailed { x: px.x, y: px.y })
    }

    /// Normalized image coordinates to distorted pixels.
    pub fn denormalize(&self, p: Point2<f64>) -> Point2<f64> {
        let d = self.distortion.distort(p);
        let v = self.k * Vector3::new(d.x, d.y, 1.0);
        Point2::new(v.x, v.y)
    }

    /// Project a camera-frame point; `None` at or behind the camera plane.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= f64::EPSILON {
            return None;
        }
        Some(self.denormalize(Point2::new(p_cam.x / p_cam.z, p_cam.y / p_cam.z)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn coefficient_lengths() {
        assert!(Distortion::from_coeffs(&[]).is_ok());
        assert!(Distortion::from_coeffs(&[0.1, 0.0, 0.0, 0.0]).is_ok());
        assert!(Distortion::from_coeffs(&[0.1, 0.0, 0.0, 0.0, 0.01]).is_ok());
        assert!(Distortion::from_coeffs(&[0.0; 8]).is_ok());
        assert_eq!(
            Distortion::from_coeffs(&[0.1, 0.2]),
            Err(CameraError::InvalidDistortion(2))
        );
    }

    #[test]
    fn undistort_inverts_distort() {
        let d = Distortion::from_coeffs(&[-0.28, 0.07, 0.001, -0.0005, 0.01]).expect("coeffs");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(0.2, -0.1),
            Point2::new(-0.35, 0.3),
        ] {
            let back = d.undistort(d.distort(p)).expect("undistort");
            assert_relative_eq!(back.x, p.x, epsilon = 1e-8);
            assert_relative_eq!(back.y, p.y, epsilon = 1e-8);
        }
    }

    #[test]
    fn normalize_and_project_agree() {
        let cam = CameraModel::from_rows(
            [[600.0, 0.0, 320.0], [0.0, 610.0, 240.0], [0.0, 0.0, 1.0]],
            &[-0.1, 0.02, 0.0, 0.0],
        )
        .expect("camera");
        let p = Vector3::new(0.12, -0.05, 0.9);
        let px = cam.project(&p).expect("in front");
        let n = cam.normalize(px).expect("normalize");
        assert_relative_eq!(n.x, p.x / p.z, epsilon = 1e-9);
        assert_relative_eq!(n.y, p.y / p.z, epsilon = 1e-9);
        assert!(cam.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn rejects_malformed_matrix() {
        assert!(CameraModel::pinhole(-1.0, 500.0, 0.0, 0.0).is_err());
        let bad = CameraModel::from_rows([[500.0, 0.0, 1.0], [0.0, 500.0, 1.0], [0.0, 0.0, 2.0]], &[]);
        assert!(matches!(bad, Err(CameraError::InvalidIntrinsics(_))));
    }
}
