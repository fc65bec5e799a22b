//! JSON configuration of the marker pipeline.

use crate::frame::ImageFormat;
use crate::io::SizeTableProvider;
use crate::{ConfigError, SizeTable};
use fiducial_pose_aruco::builtins::builtin_dictionary;
use fiducial_pose_aruco::{CandidateParams, DecoderParams, Dictionary, RefineParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything needed to build a [`crate::MarkerPipeline`].
///
/// Missing fields take their defaults, so `{}` is a valid configuration
/// (a calibration still has to come from somewhere).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Built-in dictionary name, e.g. `DICT_4X4_50`.
    pub dictionary: String,
    /// Minimum candidate perimeter relative to `max(width, height)`; the only
    /// place this rate is configured.
    pub min_marker_perimeter_rate: f32,
    pub corner_refinement: bool,
    /// Integer area-downscale applied before candidate search.
    pub downscale_factor: usize,
    /// Side length in meters for ids without an override.
    pub default_size_m: f64,
    pub id_size_overrides: BTreeMap<u32, f64>,
    /// Copied into every published detection.
    pub camera_name: String,
    /// Pixel layout of raw stream frames.
    pub image_format: ImageFormat,
    /// JSON calibration file, relative to the working directory.
    pub calibration_path: Option<PathBuf>,
    pub candidates: CandidateParams,
    pub decoder: DecoderParams,
    pub refinement: RefineParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dictionary: "DICT_4X4_50".to_string(),
            min_marker_perimeter_rate: 0.02,
            corner_refinement: true,
            downscale_factor: 1,
            default_size_m: 0.16,
            id_size_overrides: BTreeMap::new(),
            camera_name: "camera".to_string(),
            image_format: ImageFormat::Gray8,
            calibration_path: None,
            candidates: CandidateParams::default(),
            decoder: DecoderParams::default(),
            refinement: RefineParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dictionary()?;
        if self.downscale_factor < 1 {
            return Err(ConfigError::InvalidDownscale(self.downscale_factor));
        }
        let rate = self.min_marker_perimeter_rate;
        if !(rate > 0.0 && rate <= 4.0) {
            return Err(ConfigError::InvalidPerimeterRate(rate));
        }
        self.size_table().map(|_| ())
    }

    /// Resolve the configured dictionary name.
    pub fn dictionary(&self) -> Result<Dictionary, ConfigError> {
        builtin_dictionary(&self.dictionary)
            .ok_or_else(|| ConfigError::UnknownDictionary(self.dictionary.clone()))
    }

    /// Candidate parameters with the top-level perimeter rate applied.
    pub fn candidate_params(&self) -> CandidateParams {
        CandidateParams {
            min_marker_perimeter_rate: self.min_marker_perimeter_rate,
            ..self.candidates.clone()
        }
    }

    pub fn size_table(&self) -> Result<SizeTable, ConfigError> {
        let mut table = SizeTable::new(self.default_size_m)?;
        for (&id, &size) in &self.id_size_overrides {
            table = table.with_override(id, size)?;
        }
        Ok(table)
    }
}

impl SizeTableProvider for PipelineConfig {
    fn load(&self) -> Result<SizeTable, ConfigError> {
        self.size_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let cfg = PipelineConfig::from_json_str("{}").expect("config");
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.dictionary().expect("dict").name, "DICT_4X4_50");
    }

    #[test]
    fn overrides_are_parsed_from_string_keys() {
        let cfg = PipelineConfig::from_json_str(
            r#"{ "dictionary": "DICT_4X4_100", "default_size_m": 0.1,
                 "id_size_overrides": { "3": 0.25, "12": 0.05 },
                 "image_format": "nv12", "downscale_factor": 2 }"#,
        )
        .expect("config");
        assert_eq!(cfg.image_format, ImageFormat::Nv12);
        let sizes = cfg.size_table().expect("sizes");
        assert_eq!(sizes.size_for(3), 0.25);
        assert_eq!(sizes.size_for(12), 0.05);
        assert_eq!(sizes.size_for(4), 0.1);
    }

    #[test]
    fn perimeter_rate_reaches_candidate_params() {
        let cfg = PipelineConfig {
            min_marker_perimeter_rate: 0.1,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.candidate_params().min_marker_perimeter_rate, 0.1);
        assert_eq!(
            cfg.candidate_params().adaptive_thresh_win_sizes,
            cfg.candidates.adaptive_thresh_win_sizes
        );
    }

    #[test]
    fn nested_perimeter_rate_is_rejected() {
        let err = PipelineConfig::from_json_str(
            r#"{ "min_marker_perimeter_rate": 0.05,
                 "candidates": { "min_marker_perimeter_rate": 0.5 } }"#,
        )
        .expect_err("rate set twice");
        assert!(matches!(err, ConfigError::Json(_)), "{err}");
        assert!(err.to_string().contains("min_marker_perimeter_rate"), "{err}");

        let cfg = PipelineConfig::from_json_str(
            r#"{ "min_marker_perimeter_rate": 0.05,
                 "candidates": { "adaptive_thresh_constant": 5.0 } }"#,
        )
        .expect("config");
        let params = cfg.candidate_params();
        assert_eq!(params.min_marker_perimeter_rate, 0.05);
        assert_eq!(params.adaptive_thresh_constant, 5.0);

        let written = serde_json::to_value(&cfg).expect("json");
        assert!(written["candidates"]
            .get("min_marker_perimeter_rate")
            .is_none());
        assert_eq!(PipelineConfig::from_json_str(&written.to_string()).expect("round trip"), cfg);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            (r#"{ "dictionary": "DICT_9X9_1" }"#, "dictionary"),
            (r#"{ "downscale_factor": 0 }"#, "downscale"),
            (r#"{ "min_marker_perimeter_rate": 0.0 }"#, "rate"),
            (r#"{ "min_marker_perimeter_rate": 4.5 }"#, "rate"),
            (r#"{ "default_size_m": -0.1 }"#, "size"),
            (r#"{ "id_size_overrides": { "1": 0.0 } }"#, "size"),
            (r#"{ "image_format": "rgb24" }"#, "json"),
        ];
        for (raw, what) in cases {
            let err = PipelineConfig::from_json_str(raw).expect_err(what);
            let ok = match what {
                "dictionary" => matches!(err, ConfigError::UnknownDictionary(_)),
                "downscale" => matches!(err, ConfigError::InvalidDownscale(0)),
                "rate" => matches!(err, ConfigError::InvalidPerimeterRate(_)),
                "size" => matches!(err, ConfigError::InvalidSize { .. }),
                _ => matches!(err, ConfigError::Json(_)),
            };
            assert!(ok, "{raw}: {err}");
        }
    }
}
