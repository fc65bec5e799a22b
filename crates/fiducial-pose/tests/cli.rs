#![cfg(feature = "cli")]

use assert_cmd::Command;
use fiducial_pose::pnp::CameraModel;
use fiducial_pose::synthetic::{render_scene, SceneMarker};
use fiducial_pose::{Detection, JsonCalibration, PipelineConfig};
use predicates::prelude::*;
use std::path::Path;

fn cli() -> Command {
    Command::cargo_bin("fiducial-pose").expect("binary")
}

fn camera() -> CameraModel {
    CameraModel::pinhole(140.0, 140.0, 31.5, 31.5).expect("camera")
}

/// Config + calibration pair in `dir`; returns the config path.
fn write_setup(dir: &Path) -> std::path::PathBuf {
    let calibration = dir.join("camera.json");
    JsonCalibration::write(&camera(), &calibration).expect("calibration");
    let config = PipelineConfig {
        calibration_path: Some(calibration),
        camera_name: "bench".into(),
        ..PipelineConfig::default()
    };
    let path = dir.join("config.json");
    config.write_json(&path).expect("config");
    path
}

fn parse_lines(stdout: &[u8]) -> Vec<Detection> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|l| serde_json::from_str(l).expect("detection json"))
        .collect()
}

#[test]
fn lists_builtin_dictionaries() {
    cli()
        .arg("dictionaries")
        .assert()
        .success()
        .stdout(predicate::str::contains("DICT_4X4_50"))
        .stdout(predicate::str::contains("DICT_4X4_100"));
}

#[test]
fn default_config_round_trips() {
    let out = cli().arg("default-config").output().expect("run");
    assert!(out.status.success());
    let raw = String::from_utf8(out.stdout).expect("utf8");
    let parsed = PipelineConfig::from_json_str(&raw).expect("valid config");
    assert_eq!(parsed, PipelineConfig::default());
}

#[test]
fn rendered_marker_is_detected_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let png = dir.path().join("marker.png");
    cli()
        .args(["render", "--id", "3", "--cell-px", "10", "--output"])
        .arg(&png)
        .assert()
        .success();

    let img = image::open(&png).expect("png").to_luma8();
    assert_eq!(img.dimensions(), (80, 80));
    assert_eq!(img.get_pixel(0, 0).0[0], 255);
    assert_eq!(img.get_pixel(12, 12).0[0], 0);

    let config = write_setup(dir.path());
    let out = cli()
        .arg("detect")
        .arg("--config")
        .arg(&config)
        .arg(&png)
        .output()
        .expect("run");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let detections = parse_lines(&out.stdout);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].id, 3);
    assert_eq!(detections[0].camera_name, "bench");
}

#[test]
fn missing_file_does_not_end_the_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    for (id, path) in [("3", &a), ("7", &b)] {
        cli()
            .args(["render", "--id", id, "--cell-px", "10", "--output"])
            .arg(path)
            .assert()
            .success();
    }

    let config = write_setup(dir.path());
    let out = cli()
        .arg("detect")
        .arg("--config")
        .arg(&config)
        .arg(&a)
        .arg(dir.path().join("missing.png"))
        .arg(&b)
        .output()
        .expect("run");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let ids: Vec<u32> = parse_lines(&out.stdout).iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![3, 7]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing.png"));
}

#[test]
fn raw_stream_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_setup(dir.path());
    let dict = PipelineConfig::default().dictionary().expect("dict");
    let scene = [SceneMarker::facing(7, 0.16, [0.0, 0.0, 0.5])];
    let img = render_scene(&dict, &camera(), 64, 64, 255, &scene, 4);

    let raw = dir.path().join("frames.gray");
    let mut bytes = img.data.clone();
    bytes.extend_from_slice(&vec![255u8; 64 * 64]);
    bytes.extend_from_slice(&img.data);
    std::fs::write(&raw, bytes).expect("raw");

    let out = cli()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .args(["--width", "64", "--height", "64", "--frame-interval-ns", "100"])
        .arg("--input")
        .arg(&raw)
        .output()
        .expect("run");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let detections = parse_lines(&out.stdout);
    let stamps: Vec<u64> = detections.iter().map(|d| d.timestamp_ns).collect();
    assert_eq!(stamps, vec![0, 200]);
    assert!(detections.iter().all(|d| d.id == 7));
    assert!(detections
        .iter()
        .all(|d| (d.translation[2] - 0.5).abs() < 0.005));
}

#[test]
fn raw_stream_from_stdin() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_setup(dir.path());
    let dict = PipelineConfig::default().dictionary().expect("dict");
    let scene = [SceneMarker::facing(7, 0.16, [0.0, 0.0, 0.5])];
    let img = render_scene(&dict, &camera(), 64, 64, 255, &scene, 4);

    let out = cli()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .args(["--width", "64", "--height", "64"])
        .write_stdin(img.data)
        .output()
        .expect("run");
    assert!(out.status.success());
    assert_eq!(parse_lines(&out.stdout).len(), 1);
}

#[test]
fn unknown_dictionary_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    cli()
        .args(["render", "--dictionary", "DICT_9X9_1", "--id", "0", "--output"])
        .arg(dir.path().join("x.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown dictionary"));
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{ "downscale_factor": 0 }"#).expect("write");
    cli()
        .arg("run")
        .arg("--config")
        .arg(&config)
        .args(["--width", "8", "--height", "8"])
        .write_stdin(Vec::new())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn detect_without_calibration_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    cli()
        .arg("detect")
        .arg(dir.path().join("missing.png"))
        .assert()
        .failure();
}
