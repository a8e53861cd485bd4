//! Core math and model types for the heliostat action model.
//!
//! This crate contains:
//! - scalar and vector aliases (`Real`, `Vec3`, ...) and small angle helpers,
//! - generic ray/plane primitives (intersection, reflection, point-to-line distance),
//! - the heliostat parameter set ([`HamParameters`]) and forward kinematics
//!   ([`mirror_plane`]),
//! - the servo register polynomial ([`angle_to_position`], [`invert_polynomial`]),
//! - calibration observations and deterministic synthetic data helpers.
//!
//! Kinematic chain:
//! `mirror = translate(position) ∘ yaw(rotation_y) ∘ axis1(θ1) ∘ axis2(θ2) ∘ translate(-offset · down)`
//!
//! Everything geometric is generic over [`nalgebra::RealField`], so the same code
//! runs on `f64` and on the dual numbers used by the solvers in `helio-optim`.

/// Typed errors for precondition and configuration failures.
pub mod error;
/// Ray and plane primitives.
pub mod geometry;
/// Forward kinematics of the two-axis mirror.
pub mod kinematics;
/// Scalar aliases and angle helpers.
pub mod math;
/// Calibration observations.
pub mod observation;
/// Heliostat parameter types.
pub mod params;
/// Servo register polynomial.
pub mod servo;
/// Deterministic synthetic heliostat data for tests and demos.
pub mod synthetic;

pub use error::*;
pub use geometry::*;
pub use kinematics::*;
pub use math::*;
pub use observation::*;
pub use params::*;
pub use servo::*;
