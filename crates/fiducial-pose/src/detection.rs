use fiducial_pose_core::Quad;
use fiducial_pose_pnp::Pose;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// One decoded marker with its pose in the camera frame.
///
/// `translation` is the marker centre in meters; `rotation` (row-major)
/// maps marker axes into camera axes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: u32,
    /// Full-resolution pixel corners, marker TL first, clockwise.
    pub corners: Quad,
    pub translation: [f64; 3],
    pub rotation: [[f64; 3]; 3],
    pub timestamp_ns: u64,
    pub size_m: f64,
    pub camera_name: String,
    /// Bits corrected while decoding.
    pub hamming: u8,
    /// Sum of squared pixel residuals of the selected pose.
    pub reprojection_error: f64,
}

impl Detection {
    pub fn pose(&self) -> Pose {
        let r = &self.rotation;
        Pose {
            rotation: Matrix3::from_fn(|i, j| r[i][j]),
            translation: Vector3::from(self.translation),
        }
    }

    /// Distance from the camera centre to the marker centre.
    pub fn distance(&self) -> f64 {
        Vector3::from(self.translation).norm()
    }
}
