//! Plane and rotation fits against known ground truth.

use helio_core::{Plane, Quat, Ray, Vec3};
use helio_optim::{mirror_plane, rotation_frame, BackendSolveOptions, PlaneSolveOptions};

fn plane_dataset(truth: &Plane) -> (Vec<Ray>, Vec<Vec3>) {
    let camera = Vec3::new(0.05, -0.1, 0.0);
    let offsets = [
        (0.0, 0.0),
        (0.3, 0.1),
        (-0.25, 0.2),
        (0.15, -0.3),
        (-0.2, -0.15),
        (0.35, 0.3),
    ];
    // Two in-plane directions spanning the mirror.
    let u = truth.normal.cross(&Vec3::y()).normalize();
    let v = truth.normal.cross(&u).normalize();

    let mut rays = Vec::new();
    let mut points = Vec::new();
    for (i, (du, dv)) in offsets.iter().enumerate() {
        let hit = truth.center + u * *du + v * *dv;
        // Direction length puts `point_at(1)` on the mirror.
        let ray = Ray::new(camera, hit - camera);
        let reflected = truth.reflect(&ray);
        points.push(reflected.point_at(0.5 + 0.4 * i as f64));
        rays.push(ray);
    }
    (rays, points)
}

#[test]
fn plane_is_recovered_from_reflections() {
    let truth = Plane::new(Vec3::new(0.1, 0.2, 2.0), Vec3::new(0.1, -0.05, -1.0));
    let (rays, points) = plane_dataset(&truth);

    let result = mirror_plane::solve(&rays, &points, &PlaneSolveOptions::default()).unwrap();
    assert!(result.converged, "{:?}", result.error_message);

    let plane = result.solution;
    assert!((plane.normal - truth.normal).norm() < 1e-6, "{:?}", plane.normal);
    assert!(truth.signed_distance(&plane.center).abs() < 1e-6);
    for (ray, point) in rays.iter().zip(&points) {
        assert!(mirror_plane::get_residual(&plane.abcd(), ray, point) < 1e-6);
    }
}

#[test]
fn plane_normal_faces_observed_points() {
    let truth = Plane::new(Vec3::new(-0.3, 0.0, 1.5), Vec3::new(0.0, 0.2, -1.0));
    let (rays, points) = plane_dataset(&truth);

    let plane = mirror_plane::solve(&rays, &points, &PlaneSolveOptions::default())
        .unwrap()
        .solution;
    for point in &points {
        assert!(plane.signed_distance(point) > 0.0);
    }
}

#[test]
fn rotation_is_recovered_from_direction_pairs() {
    let truth = Quat::from_scaled_axis(Vec3::new(0.2, -0.5, 0.3));
    let pre = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        Vec3::new(0.3, -0.4, 1.0),
        Vec3::new(-1.0, 1.0, 0.5),
    ];
    // Scale on either side must not matter.
    let post: Vec<Vec3> = pre.iter().map(|p| truth * p * 3.0).collect();

    let result = rotation_frame::solve(&pre, &post, &BackendSolveOptions::default()).unwrap();
    assert!(result.converged, "{:?}", result.error_message);
    assert!(result.solution.rotation.angle_to(&truth) < 1e-6);
    assert!((result.solution.rodrigues - truth.scaled_axis()).norm() < 1e-6);
    assert!(result.final_cost < 1e-12);
}

#[test]
fn fits_out_of_iterations_are_not_converged() {
    let budget = BackendSolveOptions {
        max_iters: 1,
        ..BackendSolveOptions::default()
    };

    let truth = Plane::new(Vec3::new(0.1, 0.2, 2.0), Vec3::new(0.1, -0.05, -1.0));
    let (rays, points) = plane_dataset(&truth);
    let opts = PlaneSolveOptions {
        solver: budget.clone(),
        ..PlaneSolveOptions::default()
    };
    let plane = mirror_plane::solve(&rays, &points, &opts).unwrap();
    assert!(!plane.converged);

    let truth = Quat::from_scaled_axis(Vec3::new(0.2, -0.5, 0.3));
    let pre = [
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 2.0, 0.0),
        Vec3::new(0.3, -0.4, 1.0),
    ];
    let post: Vec<Vec3> = pre.iter().map(|p| truth * p).collect();
    let rotation = rotation_frame::solve(&pre, &post, &budget).unwrap();
    assert!(!rotation.converged);
}
