use serde::{Deserialize, Serialize};

use crate::backend::BackendSolution;

/// Uniform solver output.
///
/// Callers must check [`SolveResult::converged`] before trusting `solution`:
/// non-convergence is reported here, not as an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult<S> {
    pub solution: S,
    pub converged: bool,
    /// Iteration count, when the backend exposes one (tiny-solver does not).
    pub iterations: Option<usize>,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub error_message: Option<String>,
}

impl<S> SolveResult<S> {
    /// Wrap a backend solution around an already unpacked `solution`.
    pub fn from_backend(solution: S, backend: &BackendSolution) -> Self {
        let error_message = (!backend.converged).then(|| {
            format!(
                "optimizer did not converge (cost {:.6e} -> {:.6e})",
                backend.initial_cost, backend.final_cost
            )
        });
        Self {
            solution,
            converged: backend.converged,
            iterations: None,
            initial_cost: backend.initial_cost,
            final_cost: backend.final_cost,
            error_message,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.converged
    }

    /// Mark as failed with `message`, keeping the solution for inspection.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.converged = false;
        self.error_message = Some(message.into());
        self
    }

    /// Transform the solution, keeping the solve statistics.
    pub fn map<U>(self, f: impl FnOnce(S) -> U) -> SolveResult<U> {
        SolveResult {
            solution: f(self.solution),
            converged: self.converged,
            iterations: self.iterations,
            initial_cost: self.initial_cost,
            final_cost: self.final_cost,
            error_message: self.error_message,
        }
    }
}
