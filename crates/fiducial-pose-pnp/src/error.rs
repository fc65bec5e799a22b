/// Errors building or using a [`crate::CameraModel`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("invalid camera matrix: {0}")]
    InvalidIntrinsics(String),
    #[error("distortion needs 0, 4, 5 or 8 coefficients, got {0}")]
    InvalidDistortion(usize),
    #[error("point ({x:.2}, {y:.2}) cannot be undistorted")]
    UndistortFailed { x: f64, y: f64 },
}

/// Errors returned by the planar pose solver.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    /// The corner geometry admits no well-defined pose.
    #[error("degenerate pose: {reason}")]
    Degenerate { reason: &'static str },
    #[error("square side must be positive and finite, got {0}")]
    InvalidSize(f64),
}

impl PoseError {
    pub(crate) fn degenerate(reason: &'static str) -> Self {
        Self::Degenerate { reason }
    }
}

impl From<CameraError> for PoseError {
    fn from(_: CameraError) -> Self {
        Self::degenerate("corner cannot be undistorted")
    }
}
