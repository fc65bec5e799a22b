//! Rendering markers seen through a camera, for tests, benchmarks and demos.

use fiducial_pose_aruco::{marker_cells, Dictionary};
use fiducial_pose_core::GrayImage;
use fiducial_pose_pnp::{CameraModel, Pose};
use nalgebra::{Point2, Vector3};

/// A marker placed in the camera frame.
#[derive(Clone, Copy, Debug)]
pub struct SceneMarker {
    pub id: u32,
    pub size_m: f64,
    pub pose: Pose,
}

impl SceneMarker {
    /// Marker facing the camera squarely with its centre at `center`.
    pub fn facing(id: u32, size_m: f64, center: [f64; 3]) -> Self {
        Self {
            id,
            size_m,
            pose: Pose {
                rotation: nalgebra::Matrix3::from_diagonal(&Vector3::new(1.0, -1.0, -1.0)),
                translation: Vector3::from(center),
            },
        }
    }
}

/// Render `markers` on a uniform background.
///
/// Every pixel averages `supersample²` rays through the lens model, so edges
/// are anti-aliased the way a real sensor blurs them. Black cells are 0,
/// white cells 255. Unknown ids are skipped.
pub fn render_scene(
    dict: &Dictionary,
    camera: &CameraModel,
    width: usize,
    height: usize,
    background: u8,
    markers: &[SceneMarker],
    supersample: usize,
) -> GrayImage {
    let ss = supersample.max(1);
    let cells = dict.marker_size + 2;
    let layers: Vec<_> = markers
        .iter()
        .filter_map(|m| Some((m, marker_cells(dict, m.id)?)))
        .collect();

    let mut img = GrayImage::filled(width, height, background);
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0u32;
            for sy in 0..ss {
                for sx in 0..ss {
                    let px = Point2::new(
                        x as f64 - 0.5 + (sx as f64 + 0.5) / ss as f64,
                        y as f64 - 0.5 + (sy as f64 + 0.5) / ss as f64,
                    );
                    let value = camera
                        .normalize(px)
                        .ok()
                        .and_then(|n| sample_markers(&layers, cells, n))
                        .unwrap_or(background);
                    acc += value as u32;
                }
            }
            let n = (ss * ss) as u32;
            img.set(x, y, ((acc + n / 2) / n) as u8);
        }
    }
    img
}

/// Color of the nearest marker hit by the ray through normalized point `n`.
fn sample_markers(
    layers: &[(&SceneMarker, Vec<bool>)],
    cells: usize,
    n: Point2<f64>,
) -> Option<u8> {
    let ray = Vector3::new(n.x, n.y, 1.0);
    let mut best: Option<(f64, u8)> = None;
    for (m, grid) in layers {
        let normal = m.pose.rotation.column(2).into_owned();
        let denom = normal.dot(&ray);
        if denom.abs() < 1e-12 {
            continue;
        }
        let depth = normal.dot(&m.pose.translation) / denom;
        if depth <= 0.0 || best.is_some_and(|(d, _)| d <= depth) {
            continue;
        }
        let local = m.pose.rotation.transpose() * (ray * depth - m.pose.translation);
        let half = m.size_m / 2.0;
        let u = (local.x + half) / m.size_m;
        let v = (half - local.y) / m.size_m;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            continue;
        }
        let col = ((u * cells as f64) as usize).min(cells - 1);
        let row = ((v * cells as f64) as usize).min(cells - 1);
        let black = grid[row * cells + col];
        best = Some((depth, if black { 0 } else { 255 }));
    }
    best.map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiducial_pose_aruco::builtins::DICT_4X4_50;

    #[test]
    fn frontal_marker_is_centred_and_bordered() {
        let camera = CameraModel::pinhole(100.0, 100.0, 31.5, 31.5).expect("camera");
        // 0.36 m at 1 m spans 36 px: six cells of 6 px.
        let scene = [SceneMarker::facing(3, 0.36, [0.0, 0.0, 1.0])];
        let img = render_scene(&DICT_4X4_50, &camera, 64, 64, 255, &scene, 4);
        assert_eq!(img.get(0, 0), 255);
        // Border cell at the top-left of the marker.
        assert_eq!(img.get(16, 16), 0);
        // Outside the marker.
        assert_eq!(img.get(10, 31), 255);
    }

    #[test]
    fn markers_behind_the_camera_are_invisible() {
        let camera = CameraModel::pinhole(100.0, 100.0, 16.0, 16.0).expect("camera");
        let scene = [SceneMarker::facing(0, 0.2, [0.0, 0.0, -1.0])];
        let img = render_scene(&DICT_4X4_50, &camera, 32, 32, 200, &scene, 1);
        assert!(img.data.iter().all(|&v| v == 200));
    }
}
