//! Scalar aliases, angle conversion and spherical coordinates.

use nalgebra::{convert, RealField, UnitQuaternion, Vector3, Vector4};

/// Scalar type used for stored parameters and observations (currently `f64`).
pub type Real = f64;

/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 4D vector with [`Real`] components.
pub type Vec4 = Vector4<Real>;
/// Unit quaternion with [`Real`] components.
pub type Quat = UnitQuaternion<Real>;

/// Degrees to radians for any real scalar.
pub fn deg_to_rad<T: RealField>(degrees: T) -> T {
    degrees * convert::<f64, T>(std::f64::consts::PI / 180.0)
}

/// Radians to degrees for any real scalar.
pub fn rad_to_deg<T: RealField>(radians: T) -> T {
    radians * convert::<f64, T>(180.0 / std::f64::consts::PI)
}

/// Lift an `f64` vector into another scalar type.
pub fn lift3<T: RealField>(v: &Vec3) -> Vector3<T> {
    Vector3::new(convert(v.x), convert(v.y), convert(v.z))
}

/// Unit vector from polar angles (radians).
///
/// `inclination` is measured from +Z, `azimuth` from +X towards +Y.
pub fn polar_to_cartesian<T: RealField>(inclination: T, azimuth: T) -> Vector3<T> {
    let (sin_i, cos_i) = inclination.sin_cos();
    let (sin_a, cos_a) = azimuth.sin_cos();
    Vector3::new(sin_i.clone() * cos_a, sin_i * sin_a, cos_i)
}

/// Polar angles `(inclination, azimuth)` of a non-zero vector, in radians.
///
/// Inverse of [`polar_to_cartesian`]; the vector length is discarded.
pub fn cartesian_to_polar(v: &Vec3) -> (Real, Real) {
    let n = v.normalize();
    let inclination = n.z.clamp(-1.0, 1.0).acos();
    let azimuth = n.y.atan2(n.x);
    (inclination, azimuth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_roundtrip_recovers_direction() {
        for v in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.3, -0.2, 0.9),
            Vec3::new(-2.0, 1.0, -0.5),
        ] {
            let (inc, az) = cartesian_to_polar(&v);
            let back = polar_to_cartesian(inc, az);
            assert!((back - v.normalize()).norm() < 1e-12, "{v:?} -> {back:?}");
        }
    }

    #[test]
    fn degree_conversion() {
        assert!((deg_to_rad(180.0) - std::f64::consts::PI).abs() < 1e-15);
        assert!((rad_to_deg(std::f64::consts::FRAC_PI_2) - 90.0).abs() < 1e-12);
    }
}
