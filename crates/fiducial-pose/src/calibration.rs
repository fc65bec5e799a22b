//! Camera calibration files.
//!
//! Accepts the JSON shape most calibration tools emit, with matrices either
//! as nested rows or as an OpenCV-style `{ "rows", "cols", "data" }` object:
//!
//! ```json
//! {
//!   "camera_matrix": [[fx, 0, cx], [0, fy, cy], [0, 0, 1]],
//!   "distortion_coefficients": { "rows": 1, "cols": 5, "data": [k1, k2, p1, p2, k3] }
//! }
//! ```

use crate::io::CalibrationProvider;
use crate::CalibrationError;
use fiducial_pose_pnp::CameraModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatrixData {
    Rows(Vec<Vec<f64>>),
    Flat(Vec<f64>),
    Mat {
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
}

impl MatrixData {
    /// Row-major entries plus the `(rows, cols)` shape.
    fn flatten(&self, field: &'static str) -> Result<(Vec<f64>, usize, usize), CalibrationError> {
        match self {
            Self::Rows(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                if rows.iter().any(|r| r.len() != cols) {
                    return Err(CalibrationError::Malformed {
                        field,
                        reason: "ragged rows".into(),
                    });
                }
                Ok((rows.concat(), rows.len(), cols))
            }
            Self::Flat(data) => Ok((data.clone(), 1, data.len())),
            Self::Mat { rows, cols, data } => {
                if rows * cols != data.len() {
                    return Err(CalibrationError::Malformed {
                        field,
                        reason: format!("{rows}x{cols} shape with {} values", data.len()),
                    });
                }
                Ok((data.clone(), *rows, *cols))
            }
        }
    }
}

/// On-disk calibration record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub camera_matrix: MatrixData,
    #[serde(default = "no_distortion")]
    pub distortion_coefficients: MatrixData,
}

fn no_distortion() -> MatrixData {
    MatrixData::Flat(Vec::new())
}

impl CalibrationFile {
    pub fn from_camera(camera: &CameraModel) -> Self {
        let k = camera.matrix();
        let rows = (0..3)
            .map(|r| (0..3).map(|c| k[(r, c)]).collect())
            .collect();
        Self {
            camera_matrix: MatrixData::Rows(rows),
            distortion_coefficients: MatrixData::Flat(camera.distortion().to_coeffs().to_vec()),
        }
    }

    pub fn to_camera(&self) -> Result<CameraModel, CalibrationError> {
        let (k, rows, cols) = self.camera_matrix.flatten("camera_matrix")?;
        if (rows, cols) != (3, 3) && !(rows == 1 && cols == 9) {
            return Err(CalibrationError::Malformed {
                field: "camera_matrix",
                reason: format!("expected 3x3, got {rows}x{cols}"),
            });
        }
        let (dist, _, _) = self
            .distortion_coefficients
            .flatten("distortion_coefficients")?;
        let k = [[k[0], k[1], k[2]], [k[3], k[4], k[5]], [k[6], k[7], k[8]]];
        Ok(CameraModel::from_rows(k, &dist)?)
    }
}

/// Calibration loaded from a JSON file on every [`CalibrationProvider::load`].
#[derive(Clone, Debug)]
pub struct JsonCalibration {
    path: PathBuf,
}

impl JsonCalibration {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(camera: &CameraModel, path: impl AsRef<Path>) -> Result<(), CalibrationError> {
        let json = serde_json::to_string_pretty(&CalibrationFile::from_camera(camera))?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl CalibrationProvider for JsonCalibration {
    fn load(&self) -> Result<CameraModel, CalibrationError> {
        let raw = fs::read_to_string(&self.path)?;
        let file: CalibrationFile = serde_json::from_str(&raw)?;
        file.to_camera()
    }
}
