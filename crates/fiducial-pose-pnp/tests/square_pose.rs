use approx::assert_relative_eq;
use fiducial_pose_pnp::{square_object_points, CameraModel, PlanarPoseSolver, Pose, PoseError};
use nalgebra::{Point2, Rotation3, Vector3};

const SIDE: f64 = 0.16;

fn tilted_pose(roll: f64, pitch: f64, yaw: f64, t: [f64; 3]) -> Pose {
    // Start facing the camera, then tilt.
    let facing = Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI);
    let tilt = Rotation3::from_euler_angles(roll, pitch, yaw);
    Pose {
        rotation: (tilt * facing).into_inner(),
        translation: Vector3::from(t),
    }
}

fn observe(cam: &CameraModel, pose: &Pose) -> [Point2<f64>; 4] {
    square_object_points(SIDE).map(|x| cam.project(&pose.transform(&x)).expect("visible"))
}

#[test]
fn recovers_tilted_poses() {
    let cam = CameraModel::pinhole(900.0, 900.0, 640.0, 360.0).expect("camera");
    let solver = PlanarPoseSolver::new(cam.clone());
    for (roll, pitch, yaw, t) in [
        (0.3, 0.0, 0.0, [0.05, -0.02, 0.9]),
        (0.0, -0.4, 0.2, [-0.1, 0.08, 1.4]),
        (0.25, 0.35, -0.6, [0.0, 0.0, 0.6]),
    ] {
        let truth = tilted_pose(roll, pitch, yaw, t);
        let sol = solver.solve(&observe(&cam, &truth), SIDE).expect("pose");
        assert_relative_eq!(sol.pose.rotation, truth.rotation, epsilon = 1e-6);
        assert_relative_eq!(sol.pose.translation, truth.translation, epsilon = 1e-6);
    }
}

#[test]
fn selected_pose_never_loses_to_alternative() {
    let cam = CameraModel::pinhole(700.0, 700.0, 320.0, 240.0).expect("camera");
    let solver = PlanarPoseSolver::new(cam.clone());
    let truth = tilted_pose(0.05, -0.08, 0.4, [0.02, 0.01, 2.5]);
    let mut corners = observe(&cam, &truth);
    // Perturb so both candidates carry residual error.
    corners[0].x += 0.4;
    corners[2].y -= 0.3;

    let poses = solver.solve_both(&corners, SIDE).expect("pose");
    if let Some(alt) = poses.alternative {
        assert!(poses.best.reprojection_error <= alt.reprojection_error);
    }
    let best = solver.solve(&corners, SIDE).expect("pose");
    assert_eq!(best, poses.best);
}

#[test]
fn solving_is_idempotent() {
    let cam = CameraModel::pinhole(600.0, 600.0, 320.0, 240.0).expect("camera");
    let solver = PlanarPoseSolver::new(cam.clone());
    let corners = observe(&cam, &tilted_pose(0.2, 0.1, 0.0, [0.0, 0.05, 1.0]));
    let a = solver.solve(&corners, SIDE).expect("pose");
    let b = solver.solve(&corners, SIDE).expect("pose");
    assert_eq!(a, b);
}

#[test]
fn translation_scales_with_side() {
    let cam = CameraModel::pinhole(600.0, 600.0, 320.0, 240.0).expect("camera");
    let solver = PlanarPoseSolver::new(cam.clone());
    let corners = observe(&cam, &tilted_pose(0.1, 0.0, 0.0, [0.0, 0.0, 1.0]));
    let small = solver.solve(&corners, SIDE).expect("pose");
    let large = solver.solve(&corners, 2.0 * SIDE).expect("pose");
    assert_relative_eq!(
        large.pose.translation,
        small.pose.translation * 2.0,
        epsilon = 1e-9
    );
}

#[test]
fn collinear_corners_are_degenerate() {
    let cam = CameraModel::pinhole(600.0, 600.0, 320.0, 240.0).expect("camera");
    let solver = PlanarPoseSolver::new(cam);
    let corners = [
        Point2::new(100.0, 100.0),
        Point2::new(150.0, 100.0),
        Point2::new(200.0, 100.0),
        Point2::new(120.0, 180.0),
    ];
    assert!(matches!(
        solver.solve(&corners, SIDE),
        Err(PoseError::Degenerate { .. })
    ));
}

#[test]
fn distortion_is_undone_before_solving() {
    let cam = CameraModel::from_rows(
        [[820.0, 0.0, 640.0], [0.0, 815.0, 360.0], [0.0, 0.0, 1.0]],
        &[-0.25, 0.08, 0.0005, -0.0003, -0.01],
    )
    .expect("camera");
    let truth = tilted_pose(-0.2, 0.3, 0.1, [0.15, -0.1, 1.1]);
    let sol = PlanarPoseSolver::new(cam.clone())
        .solve(&observe(&cam, &truth), SIDE)
        .expect("pose");
    assert_relative_eq!(sol.pose.translation, truth.translation, epsilon = 1e-6);
    assert!(sol.reprojection_error < 1e-6);
}
