//! Generic ray and plane primitives.
//!
//! All operations are written against [`RealField`] so they can be evaluated on
//! plain floats and differentiated with dual numbers inside solver residuals.
//! Avoid in-place mutation here; values are cloned explicitly because dual
//! numbers are not `Copy`.

use crate::math::{lift3, Real};
use nalgebra::{convert, RealField, Scalar, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Half-line `origin + t * direction`.
///
/// Distances are measured to the supporting (infinite) line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ray<T: Scalar = Real> {
    pub origin: Vector3<T>,
    pub direction: Vector3<T>,
}

impl<T: RealField> Ray<T> {
    pub fn new(origin: Vector3<T>, direction: Vector3<T>) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the (unnormalized) direction.
    pub fn point_at(&self, t: T) -> Vector3<T> {
        &self.origin + &self.direction * t
    }

    /// Perpendicular offset from the ray's line to `point`.
    ///
    /// Its norm is the point-to-line distance. Unlike [`Ray::distance_to`] the
    /// offset stays differentiable when the distance is exactly zero.
    pub fn offset_to(&self, point: &Vector3<T>) -> Vector3<T> {
        let dir = self.direction.normalize();
        let delta = point - &self.origin;
        let along = dir.dot(&delta);
        delta - dir * along
    }

    /// Point-to-line distance, `|(p - o) × d| / |d|`.
    pub fn distance_to(&self, point: &Vector3<T>) -> T {
        (point - &self.origin).cross(&self.direction).norm() / self.direction.norm()
    }
}

impl Ray<Real> {
    /// Convert into another scalar type.
    pub fn cast<T: RealField>(&self) -> Ray<T> {
        Ray {
            origin: lift3(&self.origin),
            direction: lift3(&self.direction),
        }
    }
}

/// Plane through `center` with unit `normal`.
///
/// Implicit form: `normal · p + d = 0` with `d = -normal · center`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plane<T: Scalar = Real> {
    pub center: Vector3<T>,
    pub normal: Vector3<T>,
}

impl<T: RealField> Plane<T> {
    /// Create a plane; the normal is normalized.
    pub fn new(center: Vector3<T>, normal: Vector3<T>) -> Self {
        Self {
            center,
            normal: normal.normalize(),
        }
    }

    /// Build from `[a, b, c, d]` with `a x + b y + c z + d = 0`.
    ///
    /// The coefficients are rescaled so the normal has unit length; the center
    /// is the point of the plane closest to the origin.
    pub fn from_abcd(abcd: &Vector4<T>) -> Self {
        let n = Vector3::new(abcd.x.clone(), abcd.y.clone(), abcd.z.clone());
        let len = n.norm();
        let normal = n / len.clone();
        let d = abcd.w.clone() / len;
        let center = &normal * (-d);
        Self { center, normal }
    }

    /// `[a, b, c, d]` with unit normal.
    pub fn abcd(&self) -> Vector4<T> {
        let d = -self.normal.dot(&self.center);
        Vector4::new(
            self.normal.x.clone(),
            self.normal.y.clone(),
            self.normal.z.clone(),
            d,
        )
    }

    /// Signed distance, positive on the side the normal points to.
    pub fn signed_distance(&self, point: &Vector3<T>) -> T {
        self.normal.dot(&(point - &self.center))
    }

    /// Intersection of the ray's line with the plane.
    ///
    /// Non-finite when the ray is parallel to the plane.
    pub fn intersect(&self, ray: &Ray<T>) -> Vector3<T> {
        let t = self.normal.dot(&(&self.center - &ray.origin)) / self.normal.dot(&ray.direction);
        ray.point_at(t)
    }

    /// Mirror a direction about the plane.
    pub fn reflect_direction(&self, direction: &Vector3<T>) -> Vector3<T> {
        let two: T = convert(2.0);
        direction - &self.normal * (two * self.normal.dot(direction))
    }

    /// Reflect a ray: the result starts at the intersection point.
    pub fn reflect(&self, ray: &Ray<T>) -> Ray<T> {
        Ray {
            origin: self.intersect(ray),
            direction: self.reflect_direction(&ray.direction),
        }
    }
}

impl Plane<Real> {
    /// Convert into another scalar type.
    pub fn cast<T: RealField>(&self) -> Plane<T> {
        Plane {
            center: lift3(&self.center),
            normal: lift3(&self.normal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Vec3, Vec4};

    #[test]
    fn ray_distance_and_offset_agree() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0));
        let p = Vec3::new(3.0, 4.0, 10.0);
        assert!((ray.distance_to(&p) - 5.0).abs() < 1e-12);
        let offset = ray.offset_to(&p);
        assert!((offset - Vec3::new(3.0, 4.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn plane_intersect_and_reflect() {
        let plane = Plane::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -3.0));
        assert!((plane.normal - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-12);

        let ray = Ray::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 1.0));
        let hit = plane.intersect(&ray);
        assert!((hit - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-12);

        let reflected = plane.reflect(&ray);
        assert!((reflected.origin - hit).norm() < 1e-12);
        assert!((reflected.direction - Vec3::new(-1.0, 0.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn parallel_ray_gives_non_finite_intersection() {
        let plane = Plane::new(Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let hit = plane.intersect(&ray);
        assert!(!hit.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn abcd_roundtrip() {
        let plane = Plane::new(Vec3::new(0.2, -0.1, 0.5), Vec3::new(1.0, 2.0, -0.5));
        let abcd = plane.abcd();
        let back = Plane::from_abcd(&(abcd * 3.0));
        assert!((back.normal - plane.normal).norm() < 1e-12);
        assert!(back.signed_distance(&plane.center).abs() < 1e-12);
        assert!((back.abcd() - abcd).norm() < 1e-12);

        let from_raw = Plane::from_abcd(&Vec4::new(0.0, 0.0, 2.0, -1.0));
        assert!((from_raw.center - Vec3::new(0.0, 0.0, 0.5)).norm() < 1e-12);
    }
}
