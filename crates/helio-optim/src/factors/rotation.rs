//! Rotation alignment residual on a Rodrigues vector.

use helio_core::{lift3, Vec3};
use nalgebra::{convert, DVectorView, Quaternion, RealField, UnitQuaternion, Vector3};

/// Rodrigues vector (axis · angle, radians) to a unit quaternion.
///
/// Uses the Taylor expansion of `cos(θ/2)` and `sin(θ/2)/θ` near zero so the
/// derivative stays finite at the identity.
pub fn rodrigues_to_quaternion<T: RealField>(v: &Vector3<T>) -> UnitQuaternion<T> {
    let theta_sq = v.norm_squared();
    let (w, scale) = if theta_sq < convert(1e-12) {
        let w = T::one() - theta_sq.clone() / convert::<f64, T>(8.0);
        let scale = convert::<f64, T>(0.5) - theta_sq / convert::<f64, T>(48.0);
        (w, scale)
    } else {
        let theta = theta_sq.sqrt();
        let half = theta.clone() / convert::<f64, T>(2.0);
        (half.clone().cos(), half.sin() / theta)
    };
    let xyz = v * scale;
    UnitQuaternion::from_quaternion(Quaternion::new(
        w,
        xyz.x.clone(),
        xyz.y.clone(),
        xyz.z.clone(),
    ))
}

/// `R(v) · normalize(pre) - normalize(post)`; its norm is the chord of the
/// angle between the two directions.
pub(crate) fn rotation_alignment_residual_generic<T: RealField>(
    rodrigues: DVectorView<'_, T>,
    pre: [f64; 3],
    post: [f64; 3],
) -> Vector3<T> {
    debug_assert!(rodrigues.len() >= 3, "rodrigues vector must have 3 params");
    let v = Vector3::new(
        rodrigues[0].clone(),
        rodrigues[1].clone(),
        rodrigues[2].clone(),
    );
    let q = rodrigues_to_quaternion(&v);
    let pre: Vector3<T> = lift3(&Vec3::from(pre).normalize());
    let post: Vector3<T> = lift3(&Vec3::from(post).normalize());
    q * pre - post
}
