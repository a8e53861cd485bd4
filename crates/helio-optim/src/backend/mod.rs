//! Solver adapters for [`ProblemIR`].
//!
//! An adapter turns named blocks and residuals into the solver's own graph,
//! runs it and hands back values under the same block names.

mod tiny_solver_backend;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::factors;
use crate::ir::{ParamValues, ProblemIR};

pub use tiny_solver_backend::TinySolverBackend;

/// Iteration and tolerance settings shared by every solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSolveOptions {
    pub max_iters: usize,
    pub linear_solver: LinearSolverKind,
    /// Stop once an iteration lowers the cost by less than this.
    pub abs_tolerance: f64,
    /// Same, relative to the current cost.
    pub rel_tolerance: f64,
    /// Stop once the cost falls below this.
    pub cost_tolerance: f64,
    /// A finished solve counts as converged only if a short follow-up pass
    /// lowers its cost by at most this fraction (plus `abs_tolerance`).
    /// Catches solves that ran out of `max_iters`.
    pub convergence_tolerance: f64,
}

impl Default for BackendSolveOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            linear_solver: LinearSolverKind::SparseCholesky,
            abs_tolerance: 1e-10,
            rel_tolerance: 1e-10,
            cost_tolerance: 1e-16,
            convergence_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    #[default]
    SparseCholesky,
    SparseQr,
}

/// Values and costs after a solve.
///
/// When the optimizer gives up, `converged` is false and `params` holds the
/// starting values. When it stops on its iteration budget before settling,
/// `converged` is false and `params` holds the last iterate.
#[derive(Debug, Clone)]
pub struct BackendSolution {
    pub params: ParamValues,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub converged: bool,
}

pub trait OptimBackend {
    /// Errors mean the problem itself is malformed. An optimizer that stalls
    /// reports it through [`BackendSolution::converged`].
    fn solve(
        &self,
        ir: &ProblemIR,
        start: &ParamValues,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution>;
}

/// Solve with the default backend.
pub fn solve_problem(
    ir: &ProblemIR,
    start: &ParamValues,
    opts: &BackendSolveOptions,
) -> Result<BackendSolution> {
    TinySolverBackend.solve(ir, start, opts)
}

/// `0.5 · Σ r²` over all residual blocks, robust losses not applied.
pub fn evaluate_cost(ir: &ProblemIR, values: &ParamValues) -> Result<f64> {
    ir.residuals.iter().try_fold(0.0, |cost, residual| {
        let blocks = ir.gather(residual, values)?;
        Ok(cost + 0.5 * factors::evaluate(&residual.factor, &blocks).norm_squared())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FactorKind, ParamBlock, ResidualBlock, RobustLoss};
    use nalgebra::DVector;

    #[test]
    fn cost_of_servo_residual() {
        let mut ir = ProblemIR::new();
        let angle = ir.add_block(ParamBlock::new("angle", 1));
        ir.add_residual_block(ResidualBlock::new(
            vec![angle],
            FactorKind::ServoPosition {
                position: 2050.0,
                polynomial: [2048.0, 1.0, 0.0],
            },
            RobustLoss::None,
        ));
        let mut values = ParamValues::new();
        values.insert("angle".to_string(), DVector::from_element(1, 0.0));
        let cost = evaluate_cost(&ir, &values).unwrap();
        assert!((cost - 2.0).abs() < 1e-12);

        values.clear();
        assert!(evaluate_cost(&ir, &values).is_err());
    }

    #[test]
    fn options_fill_defaults_from_partial_json() {
        let opts: BackendSolveOptions = serde_json::from_str(r#"{"max_iters": 7}"#).unwrap();
        assert_eq!(opts.max_iters, 7);
        assert_eq!(opts.linear_solver, LinearSolverKind::SparseCholesky);
        assert_eq!(opts.cost_tolerance, 1e-16);
    }
}
