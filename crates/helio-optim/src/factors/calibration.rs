//! Calibration residual: one camera observation against the full model.

use crate::params::ham::ham_from_blocks;
use helio_core::{lift3, mirror_plane, CalibrationObservation, HamParameters};
use nalgebra::{convert, DVectorView, RealField, Vector2};

/// Raw `(distance, outside)` terms of one observation.
///
/// `distance` is the distance from the world point to the camera ray reflected
/// off the modeled mirror. `outside` is how far the ray/mirror intersection
/// lies beyond `mirror_radius` from the mirror center (zero inside). No
/// degeneracy handling: a ray parallel to the mirror or a flat servo
/// polynomial yields non-finite values.
pub fn calibration_terms<T: RealField>(
    model: &HamParameters<T>,
    observation: &CalibrationObservation,
    mirror_radius: f64,
) -> (T, T) {
    let angles = observation.axis_angles(&model.axis1.polynomial, &model.axis2.polynomial);
    let plane = mirror_plane(&angles, model);
    let reflected = plane.reflect(&observation.camera_ray.cast::<T>());
    let point = lift3(&observation.world_point);

    // sqrt has no derivative at zero; exact hits contribute a plain zero.
    let cross = (&point - &reflected.origin).cross(&reflected.direction);
    let cross_sq = cross.norm_squared();
    let distance = if cross_sq < convert(1e-24) {
        T::zero()
    } else {
        cross_sq.sqrt() / reflected.direction.norm()
    };

    let radius: T = convert(mirror_radius);
    let from_center_sq = (&reflected.origin - &plane.center).norm_squared();
    let outside = if from_center_sq <= radius.clone() * radius.clone() {
        T::zero()
    } else {
        from_center_sq.sqrt() - radius
    };

    (distance, outside)
}

/// Factor form over the five calibration blocks.
///
/// A non-finite term zeroes the whole observation so a single degenerate
/// sample cannot poison the joint fit.
pub(crate) fn calibration_residual_generic<T: RealField>(
    blocks: [DVectorView<'_, T>; 5],
    observation: &CalibrationObservation,
    mirror_radius: f64,
) -> Vector2<T> {
    let [position, rotation_y, rotation_axes, polynomials, mirror_offset] = blocks;
    let model = ham_from_blocks(position, rotation_y, rotation_axes, polynomials, mirror_offset);
    let (distance, outside) = calibration_terms(&model, observation, mirror_radius);
    if distance.is_finite() && outside.is_finite() {
        Vector2::new(distance, outside)
    } else {
        Vector2::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ham::{pack_ham, MIRROR_OFFSET, POLYNOMIALS, POSITION, ROTATION_AXES, ROTATION_Y};
    use helio_core::synthetic::{angle_grid, observations, reference_parameters};
    use helio_core::{Ray, Vec3};

    #[test]
    fn synthetic_observations_have_zero_residual() {
        let params = reference_parameters();
        let obs = observations(
            &params,
            &Vec3::new(0.4, -2.5, 2.0),
            &angle_grid(&[-10.0, 15.0], &[-5.0, 20.0]),
            3.0,
        );
        for o in &obs {
            let (d, outside) = calibration_terms(&params, o, 0.175);
            assert!(d.abs() < 1e-9, "distance {d}");
            assert_eq!(outside, 0.0);
        }
    }

    #[test]
    fn ray_missing_the_mirror_is_penalized() {
        let params = HamParameters::default();
        // Mirror at rest: center (0, -0.136, 0), normal (0, -1, 0).
        let obs = CalibrationObservation {
            camera_ray: Ray::new(Vec3::new(0.5, -3.0, 0.0), Vec3::new(0.0, 1.0, 0.0)),
            world_point: Vec3::new(0.5, -3.0, 0.0),
            axis1_servo_position: 2048.0,
            axis2_servo_position: 2048.0,
            axis1_angle_offset: 0.0,
            axis2_angle_offset: 0.0,
        };
        let (d, outside) = calibration_terms(&params, &obs, 0.175);
        assert!(d.abs() < 1e-12);
        assert!((outside - 0.325).abs() < 1e-12);
    }

    #[test]
    fn degenerate_observation_contributes_zero() {
        let params = HamParameters::default();
        // Ray parallel to the rest mirror plane.
        let obs = CalibrationObservation {
            camera_ray: Ray::new(Vec3::new(-1.0, -0.136, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            world_point: Vec3::new(2.0, 1.0, 0.0),
            axis1_servo_position: 2048.0,
            axis2_servo_position: 2048.0,
            axis1_angle_offset: 0.0,
            axis2_angle_offset: 0.0,
        };
        let (d, _) = calibration_terms(&params, &obs, 0.175);
        assert!(!d.is_finite());

        let blocks = pack_ham(&params);
        let r = calibration_residual_generic(
            [
                blocks[POSITION].as_view(),
                blocks[ROTATION_Y].as_view(),
                blocks[ROTATION_AXES].as_view(),
                blocks[POLYNOMIALS].as_view(),
                blocks[MIRROR_OFFSET].as_view(),
            ],
            &obs,
            0.175,
        );
        assert_eq!(r, Vector2::zeros());
    }
}
