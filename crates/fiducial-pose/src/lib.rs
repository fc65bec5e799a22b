//! Square fiducial marker detection and pose estimation for camera streams.
//!
//! This crate ties the workspace together:
//! - re-exports of the image, marker and pose crates,
//! - [`PipelineConfig`] (JSON) and the per-id [`SizeTable`],
//! - [`MarkerPipeline`]: candidates → decode → refine → planar pose → [`Detection`],
//! - the collaborator traits in [`io`] with stream, file and JSON-lines
//!   implementations,
//! - [`synthetic`] rendering of markers through a camera model.
//!
//! ## Quickstart
//!
//! ```
//! use fiducial_pose::synthetic::{render_scene, SceneMarker};
//! use fiducial_pose::{pnp::CameraModel, MarkerPipeline, PipelineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let camera = CameraModel::pinhole(140.0, 140.0, 31.5, 31.5)?;
//! let dict = config.dictionary()?;
//! let scene = [SceneMarker::facing(7, 0.16, [0.0, 0.0, 0.5])];
//! let img = render_scene(&dict, &camera, 64, 64, 255, &scene, 4);
//!
//! let pipeline = MarkerPipeline::new(&config, camera)?;
//! let detections = pipeline.process_image(&img.view(), 0);
//! assert_eq!(detections.len(), 1);
//! assert_eq!(detections[0].id, 7);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `fiducial_pose::core`: images, sampling, homographies, quads, logging.
//! - `fiducial_pose::aruco`: dictionaries, candidates, decoding, refinement.
//! - `fiducial_pose::pnp`: camera model and the square pose solver.

pub use fiducial_pose_aruco as aruco;
pub use fiducial_pose_core as core;
pub use fiducial_pose_pnp as pnp;

pub mod calibration;
mod config;
mod detection;
mod error;
pub mod frame;
pub mod io;
mod pipeline;
mod size_table;
pub mod synthetic;

pub use calibration::JsonCalibration;
pub use config::PipelineConfig;
pub use detection::Detection;
pub use error::{CalibrationError, ConfigError, PipelineError, SinkError};
pub use frame::{Frame, ImageFormat};
pub use pipeline::MarkerPipeline;
pub use size_table::SizeTable;
