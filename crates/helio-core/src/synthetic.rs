//! Deterministic synthetic heliostats and observations.
//!
//! Intended for tests, examples and CLI demos. Everything here is noise-free
//! unless a caller perturbs the output.

use crate::geometry::Ray;
use crate::kinematics::mirror_plane;
use crate::math::{Real, Vec3};
use crate::observation::CalibrationObservation;
use crate::params::{AxisAngles, HamParameters};
use crate::servo::angle_to_position;

/// A plausible "true" heliostat that differs from the default in every block.
pub fn reference_parameters() -> HamParameters {
    let mut params = HamParameters {
        position: Vec3::new(0.8, 1.5, -0.6),
        rotation_y: 7.5,
        mirror_offset: 0.14,
        ..HamParameters::default()
    };
    params.axis1.polynomial = Vec3::new(2061.0, 11.52, 0.0);
    params.axis2.polynomial = Vec3::new(2035.0, 11.31, 0.0);
    params
}

/// Cartesian product of two angle lists, axis 1 major.
pub fn angle_grid(axis1: &[Real], axis2: &[Real]) -> Vec<AxisAngles> {
    axis1
        .iter()
        .flat_map(|&a1| axis2.iter().map(move |&a2| AxisAngles::new(a1, a2)))
        .collect()
}

/// Observations of `params` seen from a camera at `camera_origin`.
///
/// For each pose the camera ray is aimed at the mirror center and the world
/// point is placed `throw_distance` along the reflected ray. Servo positions
/// are computed from the true polynomials; angle offsets are zero.
pub fn observations(
    params: &HamParameters,
    camera_origin: &Vec3,
    poses: &[AxisAngles],
    throw_distance: Real,
) -> Vec<CalibrationObservation> {
    poses
        .iter()
        .map(|angles| {
            let plane = mirror_plane(angles, params);
            let camera_ray = Ray::new(*camera_origin, (plane.center - camera_origin).normalize());
            let reflected = plane.reflect(&camera_ray);
            let world_point = reflected.origin + reflected.direction.normalize() * throw_distance;
            CalibrationObservation {
                camera_ray,
                world_point,
                axis1_servo_position: angle_to_position(angles.axis1, &params.axis1.polynomial),
                axis2_servo_position: angle_to_position(angles.axis2, &params.axis2.polynomial),
                axis1_angle_offset: 0.0,
                axis2_angle_offset: 0.0,
            }
        })
        .collect()
}
