//! Residual factor implementations with automatic differentiation support.
//!
//! All residual functions are generic over [`nalgebra::RealField`] so the same
//! code is evaluated on `f64` (cost reports, diagnostics) and on the dual
//! numbers tiny-solver uses to build Jacobians.
//!
//! # Design Pattern
//!
//! ```rust,ignore
//! pub(crate) fn my_residual_generic<T: RealField>(
//!     block: DVectorView<'_, T>,
//!     measurement: [f64; 3],
//! ) -> Vector3<T> {
//!     // constant data enters through `convert` / `lift3` / `.cast::<T>()`
//!     ...
//! }
//! ```
//!
//! ## Key Guidelines
//!
//! - Use `.clone()` on `T: RealField` values; dual numbers are not `Copy`
//! - Avoid in-place mutation
//! - Keep `sqrt`/`acos` away from zero arguments; prefer vector residuals
//! - Include `debug_assert!` for parameter dimension checks
//!
//! # Available Factors
//!
//! - [`servo`] - polynomial position residual
//! - [`navigation`] - mirror normal, point-to-point and vector-to-point residuals
//! - [`calibration`] - reflected camera ray against a world point
//! - [`plane`] - free-plane reflection and unit-norm gauge
//! - [`rotation`] - Rodrigues rotation alignment

pub mod calibration;
pub mod navigation;
pub mod plane;
pub mod rotation;
pub mod servo;

use crate::ir::FactorKind;
use nalgebra::{DVector, RealField};

/// Evaluate a factor on its parameter blocks.
///
/// `params` must follow [`FactorKind::param_dims`]; the IR validates this
/// before any backend calls in here.
pub fn evaluate<T: RealField>(factor: &FactorKind, params: &[DVector<T>]) -> DVector<T> {
    debug_assert_eq!(params.len(), factor.param_dims().len());
    match factor {
        FactorKind::ServoPosition {
            position,
            polynomial,
        } => to_dvector(servo::servo_position_residual_generic(
            params[0].as_view(),
            *position,
            *polynomial,
        )),
        FactorKind::MirrorNormal { model, target } => to_dvector(
            navigation::mirror_normal_residual_generic(params[0].as_view(), model, *target),
        ),
        FactorKind::PointToPoint {
            model,
            source,
            target,
            facing_weight,
        } => to_dvector(navigation::point_to_point_residual_generic(
            params[0].as_view(),
            model,
            *source,
            *target,
            *facing_weight,
        )),
        FactorKind::VectorToPoint {
            model,
            incident,
            target,
            facing_weight,
        } => to_dvector(navigation::vector_to_point_residual_generic(
            params[0].as_view(),
            model,
            *incident,
            *target,
            *facing_weight,
        )),
        FactorKind::CalibrationRay {
            observation,
            mirror_radius,
        } => to_dvector(calibration::calibration_residual_generic(
            [
                params[0].as_view(), // position
                params[1].as_view(), // rotation_y
                params[2].as_view(), // rotation_axes
                params[3].as_view(), // polynomials
                params[4].as_view(), // mirror_offset
            ],
            observation,
            *mirror_radius,
        )),
        FactorKind::MirrorPlaneRay { ray, point } => to_dvector(
            plane::plane_ray_residual_generic(params[0].as_view(), ray, *point),
        ),
        FactorKind::UnitNormPrior { weight } => to_dvector(plane::unit_norm_residual_generic(
            params[0].as_view(),
            *weight,
        )),
        FactorKind::RotationAlignment { pre, post } => to_dvector(
            rotation::rotation_alignment_residual_generic(params[0].as_view(), *pre, *post),
        ),
    }
}

fn to_dvector<T: RealField, const D: usize>(r: nalgebra::SVector<T, D>) -> DVector<T> {
    DVector::from_row_slice(r.as_slice())
}
