use crate::io::FrameError;
use fiducial_pose_pnp::CameraError;

/// Problems with a [`crate::PipelineConfig`]; all are fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown dictionary {0:?}")]
    UnknownDictionary(String),
    #[error("marker size {what} must be positive and finite, got {value}")]
    InvalidSize { what: String, value: f64 },
    #[error("downscale_factor must be at least 1, got {0}")]
    InvalidDownscale(usize),
    #[error("min_marker_perimeter_rate must lie in (0, 4], got {0}")]
    InvalidPerimeterRate(f32),
}

/// Why a camera calibration could not be loaded.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no calibration_path configured")]
    MissingPath,
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Failures of the sink a pipeline publishes to.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SinkError {
    /// The consumer has gone away (`BrokenPipe`); publishing cannot recover.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }
}

/// Errors that stop a [`crate::MarkerPipeline`].
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),
    #[error("calibration unavailable: {0}")]
    CalibrationUnavailable(#[from] CalibrationError),
    #[error("frame source failed: {0}")]
    Source(#[from] FrameError),
    #[error("detection sink failed: {0}")]
    Sink(#[from] SinkError),
}
