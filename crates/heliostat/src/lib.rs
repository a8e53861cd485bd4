//! High-level entry crate for the heliostat action model.
//!
//! A heliostat is a two-axis motorized mirror. This crate ties together:
//! - [`core`]: parameter types, forward kinematics, servo polynomials and
//!   calibration observations
//! - [`optim`]: the least-squares solvers (calibrator, navigator, servo
//!   inversion, mirror plane and rotation frame fits)
//! - [`HeliostatConfig`]: one heliostat's model plus its solver options
//! - [`navigate`]: pointing requests turned into register commands
//! - [`Fleet`]: many heliostats, each behind its own lock
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use heliostat::prelude::*;
//! # let observations: Vec<CalibrationObservation> = unimplemented!();
//!
//! let mut fleet = Fleet::new();
//! fleet.insert("h01", HeliostatConfig::default());
//!
//! // Fit the model to observed reflections, committed only when converged.
//! let calibration = fleet.calibrate("h01", &observations)?;
//! println!("calibrated: {}", calibration.converged);
//!
//! // Reflect the sun onto a receiver.
//! let target = Target::VectorToPoint {
//!     incident: Vec3::new(0.3, -0.8, 0.5),
//!     target: Vec3::new(0.0, 12.0, 30.0),
//! };
//! let command = fleet.navigate("h01", &target, &AxisAngles::default())?;
//! if command.converged {
//!     println!("registers: {:?}", command.solution.registers);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fleet;
pub mod navigation;

pub use config::HeliostatConfig;
pub use fleet::{Fleet, HeliostatId};
pub use navigation::{desired_normal, navigate, NavigationCommand, Target};

/// Model types and kinematics.
pub mod core {
    pub use helio_core::*;
}

/// Solvers, options and the optimization IR.
pub mod optim {
    pub use helio_optim::*;
}

/// Synthetic heliostats and observations for tests and demos.
pub mod synthetic {
    pub use helio_core::synthetic::*;
}

/// Common imports.
pub mod prelude {
    pub use crate::{navigate, Fleet, HeliostatConfig, NavigationCommand, Target};
    pub use helio_core::{
        AngleRange, AxisAngles, AxisParameters, CalibrationObservation, HamParameters,
        HelioError, Plane, Ray, RegisterValue, Vec3,
    };
    pub use helio_optim::{
        BackendSolveOptions, CalibrationOptions, NavigatorOptions, ServoAxis, SolveResult,
    };
}
