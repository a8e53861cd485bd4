//! Solver-independent description of a least-squares problem.

mod types;

pub use types::{
    Bound, FactorKind, ParamBlock, ParamId, ParamValues, ProblemIR, ResidualBlock, RobustLoss,
};
