//! Camera model and pose estimation for square planar markers.
//!
//! [`CameraModel`] wraps a pinhole intrinsic matrix and OpenCV-ordered lens
//! distortion. [`PlanarPoseSolver`] recovers the pose of a square of known
//! side from its four image corners, producing both IPPE candidates and
//! keeping the one with the lower pixel reprojection error.
//!
//! Marker frame: origin at the square's centre, `+x` right, `+y` up, `+z`
//! out of the marker face. Camera frame: `+x` right, `+y` down, `+z` forward.
//!
//! ```
//! use fiducial_pose_pnp::{CameraModel, PlanarPoseSolver};
//! use nalgebra::Point2;
//!
//! let camera = CameraModel::pinhole(800.0, 800.0, 320.0, 240.0).unwrap();
//! // A 0.2 m square seen head-on at 1 m.
//! let corners = [
//!     Point2::new(240.0, 160.0),
//!     Point2::new(400.0, 160.0),
//!     Point2::new(400.0, 320.0),
//!     Point2::new(240.0, 320.0),
//! ];
//! let pose = PlanarPoseSolver::new(camera).solve(&corners, 0.2).unwrap();
//! assert!((pose.pose.translation.z - 1.0).abs() < 1e-9);
//! ```

mod camera;
mod error;
mod square;

pub use camera::{CameraModel, Distortion};
pub use error::{CameraError, PoseError};
pub use square::{square_object_points, PlanarPose, PlanarPoseSolver, Pose, SquarePoses};
