use thiserror::Error;

/// Hard failures raised before any optimizer is invoked.
///
/// Solver non-convergence is *not* an error: it is reported through the
/// `converged` flag of a solve result. Only configuration mistakes and
/// violated preconditions end up here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HelioError {
    /// Axis 1 needs at least 180° of travel for flip disambiguation.
    #[error("axis {axis} angle range [{minimum}, {maximum}] spans less than 180 degrees")]
    AxisRangeTooNarrow {
        axis: u8,
        minimum: f64,
        maximum: f64,
    },
    /// Parallel input vectors disagree in length.
    #[error("{what}: length mismatch, expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// Too few samples for the requested solve.
    #[error("{what}: need at least {required} samples, got {got}")]
    NotEnoughData {
        what: &'static str,
        required: usize,
        got: usize,
    },
    /// A navigation result that could not be brought inside the axis ranges.
    #[error("axis angles ({axis1:.3}, {axis2:.3}) are outside the configured ranges")]
    ConstraintViolation { axis1: f64, axis2: f64 },
    /// A value that must be finite was NaN or infinite.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
    /// The manual axis flip would leave the axes out of range.
    #[error("cannot flip axes: ({axis1:.3}, {axis2:.3}) is outside the configured ranges")]
    InvalidFlip { axis1: f64, axis2: f64 },
}
