//! Per-frame orchestration: candidates, decoding, refinement, pose.

use crate::calibration::JsonCalibration;
use crate::frame::Frame;
use crate::io::{CalibrationProvider, DetectionSink, FrameError, FrameSource, SizeTableProvider};
use crate::{CalibrationError, Detection, PipelineConfig, PipelineError, SizeTable};
use fiducial_pose_aruco::{CandidateExtractor, CornerRefiner, DecodedMarker, SymbolDecoder};
use fiducial_pose_core::{downscale_area, GrayImageView};
use fiducial_pose_pnp::{CameraModel, PlanarPoseSolver};
use nalgebra::Point2;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Marker detector and pose estimator for one camera.
///
/// Immutable after construction; processing takes `&self` and keeps no
/// state between frames.
#[derive(Clone, Debug)]
pub struct MarkerPipeline {
    extractor: CandidateExtractor,
    decoder: SymbolDecoder,
    refiner: CornerRefiner,
    solver: PlanarPoseSolver,
    sizes: SizeTable,
    downscale: usize,
    camera_name: String,
    retry_delay: Duration,
}

impl MarkerPipeline {
    /// Build from a validated config and an already loaded camera.
    pub fn new(config: &PipelineConfig, camera: CameraModel) -> Result<Self, PipelineError> {
        Self::from_providers(config, &camera, config)
    }

    /// Build with calibration and sizes from external providers.
    pub fn from_providers(
        config: &PipelineConfig,
        calibration: &dyn CalibrationProvider,
        sizes: &dyn SizeTableProvider,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let camera = calibration.load()?;
        let sizes = sizes.load()?;
        let dict = config.dictionary()?;
        let refiner = if config.corner_refinement {
            CornerRefiner::new(config.refinement.clone())
        } else {
            CornerRefiner::disabled()
        };
        log::info!(
            "pipeline: {} (downscale {}, refinement {}), default size {} m",
            dict.name,
            config.downscale_factor,
            refiner.is_enabled(),
            sizes.default_size()
        );
        Ok(Self {
            extractor: CandidateExtractor::new(config.candidate_params()),
            decoder: SymbolDecoder::new(dict, config.decoder.clone()),
            refiner,
            solver: PlanarPoseSolver::new(camera),
            sizes,
            downscale: config.downscale_factor,
            camera_name: config.camera_name.clone(),
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Build from a config whose `calibration_path` names a JSON calibration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let path = config
            .calibration_path
            .as_ref()
            .ok_or(CalibrationError::MissingPath)?;
        Self::from_providers(config, &JsonCalibration::new(path), config)
    }

    /// Pause after [`FrameError::Unavailable`] before polling again.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn sizes(&self) -> &SizeTable {
        &self.sizes
    }

    pub fn camera(&self) -> &CameraModel {
        self.solver.camera()
    }

    /// Decode all markers in `img`, corners in full-resolution pixels.
    ///
    /// The same id may appear more than once.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect_markers(&self, img: &GrayImageView<'_>) -> Vec<DecodedMarker> {
        let reduced;
        let work = if self.downscale > 1 {
            reduced = downscale_area(img, self.downscale);
            reduced.view()
        } else {
            *img
        };

        let mut markers = Vec::new();
        for quad in self.extractor.candidates(work) {
            match self.decoder.decode(&work, &quad) {
                Ok(mut marker) => {
                    let full = marker.corners.upscaled(self.downscale);
                    marker.corners = self.refiner.refine(img, &full);
                    markers.push(marker);
                }
                Err(reason) => log::trace!("candidate rejected: {reason}"),
            }
        }
        markers
    }

    /// Detections with poses for a single image.
    pub fn process_image(&self, img: &GrayImageView<'_>, timestamp_ns: u64) -> Vec<Detection> {
        self.detect_markers(img)
            .into_iter()
            .filter_map(|marker| {
                let size_m = self.sizes.size_for(marker.id);
                let corners = marker
                    .corners
                    .corners
                    .map(|p| Point2::new(p.x as f64, p.y as f64));
                let solution = match self.solver.solve(&corners, size_m) {
                    Ok(s) => s,
                    Err(e) => {
                        log::debug!("marker {} dropped: {e}", marker.id);
                        return None;
                    }
                };
                Some(Detection {
                    id: marker.id,
                    corners: marker.corners,
                    translation: solution.pose.translation_array(),
                    rotation: solution.pose.rotation_rows(),
                    timestamp_ns,
                    size_m,
                    camera_name: self.camera_name.clone(),
                    hamming: marker.hamming,
                    reprojection_error: solution.reprojection_error,
                })
            })
            .collect()
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, frame),
            fields(width = frame.image.width, height = frame.image.height, ts = frame.timestamp_ns)
        )
    )]
    pub fn process_frame(&self, frame: &Frame) -> Vec<Detection> {
        let detections = self.process_image(&frame.image.view(), frame.timestamp_ns);
        log::debug!(
            "frame {}: {} detections",
            frame.timestamp_ns,
            detections.len()
        );
        detections
    }

    /// Pull frames until the source ends, publishing every detection.
    ///
    /// Returns the number of frames processed. Unavailable frames are
    /// polled again after the retry delay; frames that cannot be read or
    /// converted are skipped with a warning. A detection the sink rejects is
    /// dropped with a warning, unless the sink reports a broken pipe, which
    /// ends the run.
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> Result<usize, PipelineError>
    where
        S: FrameSource + ?Sized,
        K: DetectionSink + ?Sized,
    {
        let mut processed = 0;
        loop {
            let frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(FrameError::Unavailable) => {
                    std::thread::sleep(self.retry_delay);
                    continue;
                }
                Err(FrameError::EndOfStream) => break,
                Err(e) if e.is_skippable() => {
                    log::warn!("skipping frame: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for detection in self.process_frame(&frame) {
                let id = detection.id;
                match sink.publish(detection) {
                    Ok(()) => {}
                    Err(e) if e.is_disconnected() => return Err(e.into()),
                    Err(e) => log::warn!(
                        "dropping marker {id} of frame {}: {e}",
                        frame.timestamp_ns
                    ),
                }
            }
            processed += 1;
        }
        log::info!("stream ended after {processed} frames");
        Ok(processed)
    }
}
