use crate::backend::{
    evaluate_cost, BackendSolution, BackendSolveOptions, LinearSolverKind, OptimBackend,
};
use crate::factors;
use crate::ir::{FactorKind, ParamValues, ProblemIR, RobustLoss};
use anyhow::{ensure, Context, Result};
use nalgebra::{DVector, RealField};
use tiny_solver::factors::{Factor, FactorImpl};
use tiny_solver::loss_functions::{ArctanLoss, CauchyLoss, HuberLoss, Loss};
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// Iterations of the follow-up pass that decides convergence.
const SETTLE_ITERATIONS: usize = 2;

/// Levenberg-Marquardt through tiny-solver with automatic differentiation.
///
/// tiny-solver hands back its last iterate whether it met a tolerance or ran
/// out of iterations. Convergence is therefore decided by restarting from
/// that iterate for a couple of iterations: a solve that still has cost to
/// shed was cut short.
#[derive(Debug, Clone, Copy, Default)]
pub struct TinySolverBackend;

/// Residual evaluation with dual numbers, dispatched on the factor kind.
#[derive(Debug, Clone)]
struct AutodiffFactor(FactorKind);

impl<T: RealField> Factor<T> for AutodiffFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        factors::evaluate(&self.0, params)
    }
}

fn loss_function(loss: RobustLoss) -> Result<Option<Box<dyn Loss + Send>>> {
    let scale = match loss {
        RobustLoss::None => return Ok(None),
        RobustLoss::Huber { scale }
        | RobustLoss::Cauchy { scale }
        | RobustLoss::Arctan { scale } => scale,
    };
    ensure!(scale > 0.0, "{:?}: loss scale must be positive", loss);
    let boxed: Box<dyn Loss + Send> = match loss {
        RobustLoss::Huber { .. } => Box::new(HuberLoss::new(scale)),
        RobustLoss::Cauchy { .. } => Box::new(CauchyLoss::new(scale)),
        _ => Box::new(ArctanLoss::new(scale)),
    };
    Ok(Some(boxed))
}

fn optimizer_options(opts: &BackendSolveOptions) -> OptimizerOptions {
    OptimizerOptions {
        max_iteration: opts.max_iters,
        linear_solver_type: match opts.linear_solver {
            LinearSolverKind::SparseCholesky => LinearSolverType::SparseCholesky,
            LinearSolverKind::SparseQr => LinearSolverType::SparseQR,
        },
        min_abs_error_decrease_threshold: opts.abs_tolerance,
        min_rel_error_decrease_threshold: opts.rel_tolerance,
        min_error_threshold: opts.cost_tolerance,
        ..OptimizerOptions::default()
    }
}

impl TinySolverBackend {
    fn build_problem(&self, ir: &ProblemIR, start: &ParamValues) -> Result<Problem> {
        ir.validate()?;
        let mut problem = Problem::new();

        for block in &ir.params {
            let value = start
                .get(&block.name)
                .with_context(|| format!("no starting value for block '{}'", block.name))?;
            ensure!(
                value.len() == block.dim,
                "starting value of '{}' has {} entries, expected {}",
                block.name,
                value.len(),
                block.dim
            );
            if block.fixed {
                (0..block.dim).for_each(|i| problem.fix_variable(&block.name, i));
            }
            for bound in &block.bounds {
                problem.set_variable_bounds(&block.name, bound.index, bound.lower, bound.upper);
            }
        }

        for residual in &ir.residuals {
            let names: Vec<&str> = residual
                .params
                .iter()
                .map(|&id| ir.params[id.0].name.as_str())
                .collect();
            let factor: Box<dyn FactorImpl + Send> =
                Box::new(AutodiffFactor(residual.factor.clone()));
            problem.add_residual_block(
                residual.residual_dim(),
                &names,
                factor,
                loss_function(residual.loss)?,
            );
        }
        Ok(problem)
    }

    /// `true` when a short follow-up pass from `params` finds no real progress.
    fn settled(
        &self,
        problem: &Problem,
        ir: &ProblemIR,
        params: &ParamValues,
        cost: f64,
        opts: &BackendSolveOptions,
    ) -> Result<bool> {
        if cost <= opts.cost_tolerance {
            return Ok(true);
        }
        let follow_up = OptimizerOptions {
            max_iteration: SETTLE_ITERATIONS,
            ..optimizer_options(opts)
        };
        let Some(next) =
            LevenbergMarquardtOptimizer::default().optimize(problem, params, Some(follow_up))
        else {
            return Ok(true);
        };
        let next_cost = evaluate_cost(ir, &next)?;
        let gain = cost - next_cost;
        log::trace!("follow-up pass: cost {cost:.6e} -> {next_cost:.6e}");
        Ok(!next_cost.is_finite() || gain <= opts.convergence_tolerance * cost + opts.abs_tolerance)
    }
}

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        start: &ParamValues,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        let problem = self.build_problem(ir, start)?;
        let initial_cost = evaluate_cost(ir, start)?;
        let unchanged = |converged| BackendSolution {
            params: start.clone(),
            initial_cost,
            final_cost: initial_cost,
            converged,
        };

        if ir.is_fully_fixed() {
            log::debug!("every block is fixed, nothing to optimize");
            return Ok(unchanged(initial_cost.is_finite()));
        }

        let optimizer = LevenbergMarquardtOptimizer::default();
        let Some(params) = optimizer.optimize(&problem, start, Some(optimizer_options(opts)))
        else {
            log::warn!("optimizer gave up at cost {initial_cost:.6e}");
            return Ok(unchanged(false));
        };

        let final_cost = evaluate_cost(ir, &params)?;
        log::debug!(
            "{} residuals over {} blocks: cost {:.6e} -> {:.6e}",
            ir.residuals.len(),
            ir.params.len(),
            initial_cost,
            final_cost
        );
        let converged =
            final_cost.is_finite() && self.settled(&problem, ir, &params, final_cost, opts)?;
        if final_cost.is_finite() && !converged {
            log::warn!(
                "optimizer stopped before settling (max_iters {}, cost {final_cost:.6e})",
                opts.max_iters
            );
        }
        Ok(BackendSolution {
            params,
            initial_cost,
            final_cost,
            converged,
        })
    }
}
