//! Servo polynomial residual.

use helio_core::angle_to_position;
use nalgebra::{convert, DVectorView, RealField, Vector1, Vector3};

/// `angle_to_position(θ) - position`, in register units.
pub(crate) fn servo_position_residual_generic<T: RealField>(
    angle: DVectorView<'_, T>,
    position: f64,
    polynomial: [f64; 3],
) -> Vector1<T> {
    debug_assert!(!angle.is_empty(), "angle must have 1 param");
    let poly = Vector3::new(
        convert(polynomial[0]),
        convert(polynomial[1]),
        convert(polynomial[2]),
    );
    Vector1::new(angle_to_position(angle[0].clone(), &poly) - convert::<f64, T>(position))
}
