//! Servo register polynomial.
//!
//! Each axis maps its mechanical angle θ (degrees) to a servo register position
//! through `position = c0 + c1·θ + c2·θ²`. The forward direction is a plain
//! evaluation; the inverse is either a Newton iteration ([`invert_polynomial`],
//! differentiable, used inside cost functions) or a least-squares solve in
//! `helio-optim`.

use crate::error::HelioError;
use crate::math::{Real, Vec3};
use nalgebra::{convert, RealField, Vector3};

/// Integer servo register value.
pub type RegisterValue = u16;

/// Largest representable register value.
pub const REGISTER_MAX: RegisterValue = 4095;

/// Register value of the mechanical center.
pub const REGISTER_CENTER: RegisterValue = 2048;

const NEWTON_STEPS: usize = 6;

/// Polynomial of a servo with 4096 steps per turn centered at 2048.
pub fn default_polynomial() -> Vec3 {
    Vec3::new(REGISTER_CENTER as Real, 4096.0 / 360.0, 0.0)
}

/// Evaluate `c0 + c1·θ + c2·θ²`.
pub fn angle_to_position<T: RealField>(angle: T, polynomial: &Vector3<T>) -> T {
    polynomial[0].clone()
        + polynomial[1].clone() * angle.clone()
        + polynomial[2].clone() * angle.clone() * angle
}

/// `d position / d θ`.
pub fn position_slope<T: RealField>(angle: T, polynomial: &Vector3<T>) -> T {
    let two: T = convert(2.0);
    polynomial[1].clone() + two * polynomial[2].clone() * angle
}

/// Angle whose polynomial value equals `position`.
///
/// Newton iteration started from the linear part of the polynomial. Every step
/// is an arithmetic expression in the coefficients, so the result can be
/// differentiated with respect to them. A vanishing derivative yields a
/// non-finite angle; callers check with `is_finite`.
pub fn invert_polynomial<T: RealField>(position: T, polynomial: &Vector3<T>) -> T {
    let mut angle = (position.clone() - polynomial[0].clone()) / polynomial[1].clone();
    for _ in 0..NEWTON_STEPS {
        let error = angle_to_position(angle.clone(), polynomial) - position.clone();
        angle = angle.clone() - error / position_slope(angle, polynomial);
    }
    angle
}

/// Evaluate, round and clamp to the register range.
///
/// Positions beyond the representable range are clamped, not rejected.
pub fn angle_to_register(angle: Real, polynomial: &Vec3) -> Result<RegisterValue, HelioError> {
    let position = angle_to_position(angle, polynomial);
    if !position.is_finite() {
        return Err(HelioError::NonFinite("servo position"));
    }
    let clamped = position.round().clamp(0.0, REGISTER_MAX as Real);
    Ok(clamped as RegisterValue)
}
