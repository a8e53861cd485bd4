//! Non-linear least-squares solvers for the heliostat action model, built on
//! tiny-solver.
//!
//! Problems are described in a backend-independent IR ([`ir`]) of named
//! parameter blocks and residual blocks, compiled by a backend ([`backend`])
//! and differentiated automatically through the generic residuals in
//! [`factors`]. Solvers never treat non-convergence as an error: it is
//! reported through [`SolveResult::converged`]. Precondition failures surface
//! as `anyhow` errors wrapping [`helio_core::HelioError`].

pub mod backend;
pub mod factors;
pub mod ir;
pub mod params;
pub mod problems;
mod result;

pub use crate::backend::{BackendSolveOptions, LinearSolverKind};
pub use crate::ir::RobustLoss;
pub use crate::problems::calibrator::{
    get_residual, residual_report, solve_calibration, CalibrationOptions, ResidualReport,
};
pub use crate::problems::navigator::{
    constrain_angles, flip, solve_constrained, solve_normal, solve_point_to_point,
    solve_vector_to_point, validate, NavigatorOptions,
};
pub use crate::problems::rotation_frame::RotationFrame;
pub use crate::problems::servo::{position_to_angle, ServoAxis, ServoSolveOptions};
pub use crate::problems::{mirror_plane, rotation_frame};
pub use crate::problems::mirror_plane::PlaneSolveOptions;
pub use crate::result::SolveResult;
