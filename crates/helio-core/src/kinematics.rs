//! Forward kinematics: axis angles to mirror plane.

use crate::geometry::Plane;
use crate::math::deg_to_rad;
use crate::params::{AxisAngles, HamParameters};
use nalgebra::{convert, Matrix3, RealField, Vector3};

/// Rotation by `angle` radians about `axis`, by Rodrigues' formula.
///
/// Evaluated in closed form with no zero-angle shortcut, so derivatives taken
/// through dual numbers stay exact at `angle = 0`.
fn rotation_about<T: RealField>(axis: &Vector3<T>, angle: T) -> Matrix3<T> {
    let k = axis.normalize();
    let (sin, cos) = angle.sin_cos();
    let cross = k.cross_matrix();
    Matrix3::identity() * cos.clone() + cross * sin + (&k * k.transpose()) * (T::one() - cos)
}

/// Mirror orientation for the given angles, without the pivot translation.
fn mount_rotation<T: RealField>(angles: &AxisAngles<T>, params: &HamParameters<T>) -> Matrix3<T> {
    let yaw = rotation_about(&Vector3::y(), deg_to_rad(params.rotation_y.clone()));
    let axis1 = rotation_about(&params.axis1.rotation_axis, deg_to_rad(angles.axis1.clone()));
    let axis2 = rotation_about(&params.axis2.rotation_axis, deg_to_rad(angles.axis2.clone()));
    yaw * axis1 * axis2
}

/// Mirror center and unit normal in world coordinates.
///
/// The center is the pivot displaced by `mirror_offset` along the rotated local
/// down axis `(0, -1, 0)`; the normal is that rotated axis.
pub fn mirror_center_and_normal<T: RealField>(
    angles: &AxisAngles<T>,
    params: &HamParameters<T>,
) -> (Vector3<T>, Vector3<T>) {
    let rotation = mount_rotation(angles, params);
    let down = Vector3::new(T::zero(), -T::one(), T::zero());
    let normal = (&rotation * down).normalize();
    let center = &params.position + &normal * params.mirror_offset.clone();
    (center, normal)
}

/// Mirror plane for the given axis angles.
pub fn mirror_plane<T: RealField>(angles: &AxisAngles<T>, params: &HamParameters<T>) -> Plane<T> {
    let (center, normal) = mirror_center_and_normal(angles, params);
    Plane { center, normal }
}

/// Angle between two directions in degrees.
pub fn angle_between_deg<T: RealField>(a: &Vector3<T>, b: &Vector3<T>) -> T {
    let cos = a.normalize().dot(&b.normalize());
    let cos = cos.clamp(-T::one(), T::one());
    cos.acos() * convert::<f64, T>(180.0 / std::f64::consts::PI)
}
