//! Problem builders and solve entry points.
//!
//! Each problem assembles a [`crate::ir::ProblemIR`] with initial values, runs
//! it through [`crate::backend::solve_problem`] and unpacks the named
//! blocks into a [`crate::SolveResult`].

pub mod calibrator;
pub mod mirror_plane;
pub mod navigator;
pub mod rotation_frame;
pub mod servo;
