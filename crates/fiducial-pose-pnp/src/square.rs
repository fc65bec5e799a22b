//! Pose of a square planar target from its four image corners (IPPE).
//!
//! The homography between the object plane and the normalized image plane is
//! linearised at the square's centre. Its Jacobian fixes the plane's rotation
//! up to a reflection of the plane normal about the centre's viewing ray, so
//! two rotations are produced. Each gets a least-squares translation and the
//! one reprojecting closer to the observed corners wins.
//!
//! Reference: T. Collins and A. Bartoli, "Infinitesimal Plane-based Pose
//! Estimation", IJCV 2014.

use crate::{CameraModel, PoseError};
use fiducial_pose_core::homography_from_4pt_f64;
use nalgebra::{Matrix2, Matrix3, Point2, Rotation3, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

const GAMMA_EPS: f64 = 1e-12;

/// Rigid transform taking marker-frame points into the camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn transform(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Row-major rotation matrix.
    pub fn rotation_rows(&self) -> [[f64; 3]; 3] {
        let r = &self.rotation;
        [
            [r[(0, 0)], r[(0, 1)], r[(0, 2)]],
            [r[(1, 0)], r[(1, 1)], r[(1, 2)]],
            [r[(2, 0)], r[(2, 1)], r[(2, 2)]],
        ]
    }

    pub fn translation_array(&self) -> [f64; 3] {
        [self.translation.x, self.translation.y, self.translation.z]
    }
}

/// A pose together with its reprojection error (sum of squared pixel residuals).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanarPose {
    pub pose: Pose,
    pub reprojection_error: f64,
}

/// Both IPPE candidates; `best` has the lower reprojection error.
///
/// `alternative` is `None` when the second candidate puts the square behind
/// the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SquarePoses {
    pub best: PlanarPose,
    pub alternative: Option<PlanarPose>,
}

/// Object corners of a square of side `side`, centred at the origin in the
/// `z = 0` plane, ordered TL, TR, BR, BL with `+y` up.
pub fn square_object_points(side: f64) -> [Vector3<f64>; 4] {
    let s = side / 2.0;
    [
        Vector3::new(-s, s, 0.0),
        Vector3::new(s, s, 0.0),
        Vector3::new(s, -s, 0.0),
        Vector3::new(-s, -s, 0.0),
    ]
}

/// Square pose solver bound to one camera.
#[derive(Clone, Debug)]
pub struct PlanarPoseSolver {
    camera: CameraModel,
}

impl PlanarPoseSolver {
    pub fn new(camera: CameraModel) -> Self {
        Self { camera }
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Best pose for pixel corners ordered TL, TR, BR, BL.
    pub fn solve(&self, corners: &[Point2<f64>; 4], side: f64) -> Result<PlanarPose, PoseError> {
        self.solve_both(corners, side).map(|p| p.best)
    }

    /// Both pose candidates, ranked by reprojection error.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn solve_both(
        &self,
        corners: &[Point2<f64>; 4],
        side: f64,
    ) -> Result<SquarePoses, PoseError> {
        if !(side.is_finite() && side > 0.0) {
            return Err(PoseError::InvalidSize(side));
        }
        if corners.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(PoseError::degenerate("non-finite corner"));
        }

        let mut normalized = [Point2::origin(); 4];
        for (n, px) in normalized.iter_mut().zip(corners) {
            *n = self.camera.normalize(*px)?;
        }

        let object = square_object_points(side);
        let plane = object.map(|p| Point2::new(p.x, p.y));
        let h = homography_from_4pt_f64(&plane, &normalized)
            .ok_or_else(|| PoseError::degenerate("corners admit no homography"))?
            .h;

        let rotations = ippe_rotations(&h)?;

        let mut candidates = rotations
            .into_iter()
            .filter_map(|r| {
                let t = translation_for(&r, &object, &normalized)?;
                let pose = Pose {
                    rotation: r,
                    translation: t,
                };
                let err = self.reprojection_error(&pose, &object, corners)?;
                Some(PlanarPose {
                    pose,
                    reprojection_error: err,
                })
            })
            .collect::<Vec<_>>();

        candidates.sort_by(|a, b| a.reprojection_error.total_cmp(&b.reprojection_error));
        let mut it = candidates.into_iter();
        let best = it
            .next()
            .ok_or_else(|| PoseError::degenerate("no candidate places the square in front"))?;
        let alternative = it.next();
        log::trace!(
            "pose t={:?} err={:.4} alt_err={:?}",
            best.pose.translation_array(),
            best.reprojection_error,
            alternative.map(|a| a.reprojection_error)
        );
        Ok(SquarePoses { best, alternative })
    }

    fn reprojection_error(
        &self,
        pose: &Pose,
        object: &[Vector3<f64>; 4],
        corners: &[Point2<f64>; 4],
    ) -> Option<f64> {
        let mut sum = 0.0;
        for (x, observed) in object.iter().zip(corners) {
            let p = self.camera.project(&pose.transform(x))?;
            sum += (p - observed).norm_squared();
        }
        sum.is_finite().then_some(sum)
    }
}

/// The two rotations consistent with the homography's first-order behaviour
/// at the object origin.
fn ippe_rotations(h: &Matrix3<f64>) -> Result<[Matrix3<f64>; 2], PoseError> {
    // With h22 = 1 the origin maps to (p, q).
    let (p, q) = (h[(0, 2)], h[(1, 2)]);
    let j = Matrix2::new(
        h[(0, 0)] - h[(2, 0)] * p,
        h[(0, 1)] - h[(2, 1)] * p,
        h[(1, 0)] - h[(2, 0)] * q,
        h[(1, 1)] - h[(2, 1)] * q,
    );

    let ray = Vector3::new(p, q, 1.0);
    let rv = Rotation3::rotation_between(&Vector3::z(), &ray)
        .ok_or_else(|| PoseError::degenerate("viewing ray undefined"))?
        .into_inner();

    let b = Matrix2::new(
        rv[(0, 0)] - p * rv[(2, 0)],
        rv[(0, 1)] - p * rv[(2, 1)],
        rv[(1, 0)] - q * rv[(2, 0)],
        rv[(1, 1)] - q * rv[(2, 1)],
    );
    let a = b
        .try_inverse()
        .ok_or_else(|| PoseError::degenerate("singular ray basis"))?
        * j;

    // Largest singular value of A.
    let ata00 = a[(0, 0)] * a[(0, 0)] + a[(1, 0)] * a[(1, 0)];
    let ata01 = a[(0, 0)] * a[(0, 1)] + a[(1, 0)] * a[(1, 1)];
    let ata11 = a[(0, 1)] * a[(0, 1)] + a[(1, 1)] * a[(1, 1)];
    let gamma = (0.5
        * (ata00 + ata11 + ((ata00 - ata11).powi(2) + 4.0 * ata01 * ata01).sqrt()))
    .sqrt();
    if !gamma.is_finite() || gamma < GAMMA_EPS {
        return Err(PoseError::degenerate("vanishing homography jacobian"));
    }

    let r22 = a / gamma;
    let b0 = (1.0 - r22[(0, 0)].powi(2) - r22[(1, 0)].powi(2)).max(0.0).sqrt();
    let mut b1 = (1.0 - r22[(0, 1)].powi(2) - r22[(1, 1)].powi(2)).max(0.0).sqrt();
    if -r22[(0, 0)] * r22[(0, 1)] - r22[(1, 0)] * r22[(1, 1)] < 0.0 {
        b1 = -b1;
    }

    let build = |sign: f64| -> Result<Matrix3<f64>, PoseError> {
        let c0 = Vector3::new(r22[(0, 0)], r22[(1, 0)], sign * b0);
        let c1 = Vector3::new(r22[(0, 1)], r22[(1, 1)], sign * b1);
        let partial = Matrix3::from_columns(&[c0, c1, c0.cross(&c1)]);
        nearest_rotation(&(rv * partial))
    };
    Ok([build(1.0)?, build(-1.0)?])
}

/// Project `m` onto SO(3) in the Frobenius sense.
fn nearest_rotation(m: &Matrix3<f64>) -> Result<Matrix3<f64>, PoseError> {
    let svd = m.svd(true, true);
    let (u, v_t) = svd
        .u
        .zip(svd.v_t)
        .ok_or_else(|| PoseError::degenerate("rotation svd failed"))?;
    let d = (u * v_t).determinant().signum();
    let r = u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d)) * v_t;
    if r.iter().all(|v| v.is_finite()) {
        Ok(r)
    } else {
        Err(PoseError::degenerate("non-finite rotation"))
    }
}

/// Least-squares translation for a fixed rotation, from
/// `(R X + t).xy = n · (R X + t).z` over all correspondences.
///
/// Returns `None` when the system is singular or the square ends up at or
/// behind the camera centre.
fn translation_for(
    r: &Matrix3<f64>,
    object: &[Vector3<f64>; 4],
    normalized: &[Point2<f64>; 4],
) -> Option<Vector3<f64>> {
    let mut a = SMatrix::<f64, 8, 3>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (x, n)) in object.iter().zip(normalized).enumerate() {
        let y = r * x;
        a[(2 * k, 0)] = 1.0;
        a[(2 * k, 2)] = -n.x;
        b[2 * k] = n.x * y.z - y.x;
        a[(2 * k + 1, 1)] = 1.0;
        a[(2 * k + 1, 2)] = -n.y;
        b[2 * k + 1] = n.y * y.z - y.y;
    }
    let at = a.transpose();
    let t = (at * a).cholesky()?.solve(&(at * b));
    let in_front = object.iter().all(|x| (r * x + t).z > 0.0);
    (t.iter().all(|v| v.is_finite()) && in_front).then_some(t)
}
