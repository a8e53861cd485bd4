//! Residuals for fitting a free reflecting plane `[a, b, c, d]`.

use helio_core::{lift3, Plane, Ray, Vec3};
use nalgebra::{convert, DVectorView, RealField, Vector1, Vector3, Vector4};

fn plane_from_block<T: RealField>(abcd: DVectorView<'_, T>) -> Plane<T> {
    debug_assert!(abcd.len() >= 4, "plane must have 4 params");
    Plane::from_abcd(&Vector4::new(
        abcd[0].clone(),
        abcd[1].clone(),
        abcd[2].clone(),
        abcd[3].clone(),
    ))
}

/// Offset of `point` from `ray` reflected off the plane.
///
/// The coefficients are normalized before use, so the cost is invariant to
/// the scale of `[a, b, c, d]`.
pub fn plane_ray_residual_generic<T: RealField>(
    abcd: DVectorView<'_, T>,
    ray: &Ray,
    point: [f64; 3],
) -> Vector3<T> {
    let plane = plane_from_block(abcd);
    let reflected = plane.reflect(&ray.cast::<T>());
    reflected.offset_to(&lift3(&Vec3::from(point)))
}

/// `weight · (|(a, b, c)|² - 1)`: fixes the scale gauge of the plane block.
pub(crate) fn unit_norm_residual_generic<T: RealField>(
    abcd: DVectorView<'_, T>,
    weight: f64,
) -> Vector1<T> {
    let n = Vector3::new(abcd[0].clone(), abcd[1].clone(), abcd[2].clone());
    Vector1::new((n.norm_squared() - T::one()) * convert::<f64, T>(weight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn residual_is_scale_invariant() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::new(0.2, 0.1, 1.0));
        let point = [1.0, -0.5, -3.0];
        let abcd = DVector::from_vec(vec![0.1, 0.2, -1.0, 0.4]);
        let scaled = &abcd * 3.5;
        let r1 = plane_ray_residual_generic(abcd.as_view(), &ray, point);
        let r2 = plane_ray_residual_generic(scaled.as_view(), &ray, point);
        assert!((r1 - r2).norm() < 1e-12);

        let prior = unit_norm_residual_generic(scaled.as_view(), 1.0);
        assert!(prior[0] > 0.0);
    }
}
