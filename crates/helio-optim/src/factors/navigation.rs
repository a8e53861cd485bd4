//! Navigator residuals over a 2D `[axis1, axis2]` angle block.
//!
//! The kinematic model is constant data here; only the angles are variables.

use helio_core::{lift3, mirror_center_and_normal, AxisAngles, HamParameters, Ray, Vec3};
use nalgebra::{convert, DVectorView, RealField, Vector3, Vector4};

fn angles_from_block<T: RealField>(angles: DVectorView<'_, T>) -> AxisAngles<T> {
    debug_assert!(angles.len() >= 2, "angles must have 2 params");
    AxisAngles::new(angles[0].clone(), angles[1].clone())
}

/// Reflected ray leaving the mirror center for light arriving along `incident`.
fn reflected_ray<T: RealField>(
    center: &Vector3<T>,
    normal: &Vector3<T>,
    incident: &Vector3<T>,
) -> Ray<T> {
    let two: T = convert(2.0);
    let direction = incident - normal * (two * normal.dot(incident));
    Ray::new(center.clone(), direction)
}

/// `normal - target`.
///
/// Its squared norm is `4 sin²(α/2)` for the angle α between the two unit
/// vectors: monotone in α and smooth at α = 0.
pub(crate) fn mirror_normal_residual_generic<T: RealField>(
    angles: DVectorView<'_, T>,
    model: &HamParameters,
    target: [f64; 3],
) -> Vector3<T> {
    let model = model.cast::<T>();
    let (_, normal) = mirror_center_and_normal(&angles_from_block(angles), &model);
    let target: Vector3<T> = lift3(&Vec3::from(target).normalize());
    normal - target
}

/// `-dot(normalize(target - center), normal) · weight` when the mirror faces
/// away from `target`, zero otherwise.
fn facing_penalty<T: RealField>(
    center: &Vector3<T>,
    normal: &Vector3<T>,
    target: &Vector3<T>,
    weight: f64,
) -> T {
    let facing = (target - center).normalize().dot(normal);
    if facing < T::zero() {
        -facing * convert::<f64, T>(weight)
    } else {
        T::zero()
    }
}

fn with_penalty<T: RealField>(offset: Vector3<T>, penalty: T) -> Vector4<T> {
    Vector4::new(offset.x.clone(), offset.y.clone(), offset.z.clone(), penalty)
}

/// Perpendicular offset of `target` from the reflection of `source → center`,
/// plus the facing penalty.
///
/// The offset alone also vanishes with the mirror edge-on to the light (the
/// ray passes straight through) or facing away from `target` (the reflected
/// line runs backwards through it). The penalty rules out the second case.
pub(crate) fn point_to_point_residual_generic<T: RealField>(
    angles: DVectorView<'_, T>,
    model: &HamParameters,
    source: [f64; 3],
    target: [f64; 3],
    facing_weight: f64,
) -> Vector4<T> {
    let model = model.cast::<T>();
    let (center, normal) = mirror_center_and_normal(&angles_from_block(angles), &model);
    let source: Vector3<T> = lift3(&Vec3::from(source));
    let target: Vector3<T> = lift3(&Vec3::from(target));
    let incident = &center - source;
    let offset = reflected_ray(&center, &normal, &incident).offset_to(&target);
    with_penalty(offset, facing_penalty(&center, &normal, &target, facing_weight))
}

/// Reflected-ray offset for a fixed incident direction, plus the facing penalty.
pub(crate) fn vector_to_point_residual_generic<T: RealField>(
    angles: DVectorView<'_, T>,
    model: &HamParameters,
    incident: [f64; 3],
    target: [f64; 3],
    facing_weight: f64,
) -> Vector4<T> {
    let model = model.cast::<T>();
    let (center, normal) = mirror_center_and_normal(&angles_from_block(angles), &model);
    let incident: Vector3<T> = lift3(&Vec3::from(incident));
    let target: Vector3<T> = lift3(&Vec3::from(target));
    let offset = reflected_ray(&center, &normal, &incident).offset_to(&target);
    with_penalty(offset, facing_penalty(&center, &normal, &target, facing_weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn block(a1: f64, a2: f64) -> DVector<f64> {
        DVector::from_vec(vec![a1, a2])
    }

    #[test]
    fn normal_residual_vanishes_at_model_normal() {
        let model = HamParameters::default();
        let angles = block(25.0, -10.0);
        let (_, normal) = mirror_center_and_normal(&AxisAngles::new(25.0, -10.0), &model);
        let r = mirror_normal_residual_generic(angles.as_view(), &model, normal.into());
        assert!(r.norm() < 1e-12);
    }

    #[test]
    fn point_to_point_residual_vanishes_for_true_reflection() {
        let model = HamParameters::default();
        let angles = AxisAngles::new(20.0, 15.0);
        let (center, normal) = mirror_center_and_normal(&angles, &model);
        let source = center + Vec3::new(0.3, -2.0, 0.5);
        let incident = center - source;
        let reflected = incident - normal * (2.0 * normal.dot(&incident));
        let target = center + reflected * 1.7;

        let r = point_to_point_residual_generic(
            block(20.0, 15.0).as_view(),
            &model,
            source.into(),
            target.into(),
            1000.0,
        );
        assert!(r.norm() < 1e-9);
    }

    #[test]
    fn point_to_point_penalizes_mirror_facing_away() {
        let mut model = HamParameters::default();
        model.mirror_offset = 0.0;
        // Normal (0, -1, 0) at rest: source and target on the same line
        // through the pivot, on opposite sides.
        let source = [0.0, -2.0, 0.0];
        let behind = [0.0, 3.0, 0.0];
        let r = point_to_point_residual_generic(block(0.0, 0.0).as_view(), &model, source, behind, 1000.0);
        // The reflected line runs back through the target...
        assert!(r.fixed_rows::<3>(0).norm() < 1e-12);
        // ...but the mirror faces away from it.
        assert!((r[3] - 1000.0).abs() < 1e-9);

        let front = [0.5, -3.0, 0.0];
        let r = point_to_point_residual_generic(block(0.0, 0.0).as_view(), &model, source, front, 1000.0);
        assert_eq!(r[3], 0.0);
    }

    #[test]
    fn facing_penalty_only_when_mirror_faces_away() {
        let model = HamParameters::default();
        // Rest normal is (0, -1, 0).
        let incident = [0.0, 1.0, 0.0];
        let below = vector_to_point_residual_generic(
            block(0.0, 0.0).as_view(),
            &model,
            incident,
            [0.0, -3.0, 0.0],
            2.0,
        );
        assert!(below[3].abs() < 1e-12);

        let above = vector_to_point_residual_generic(
            block(0.0, 0.0).as_view(),
            &model,
            incident,
            [0.0, 3.0, 0.0],
            2.0,
        );
        assert!((above[3] - 2.0).abs() < 1e-12);
    }
}
