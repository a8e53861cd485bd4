//! Servo register ↔ axis angle conversion.
//!
//! The forward direction (angle to register) is a direct polynomial
//! evaluation. The inverse is a one-parameter least-squares solve on the same
//! polynomial, so both directions always agree.

use crate::backend::{solve_problem, BackendSolveOptions};
use crate::ir::{FactorKind, ParamBlock, ProblemIR, ResidualBlock, RobustLoss};
use crate::result::SolveResult;
use anyhow::{anyhow, Result};
use helio_core::{
    angle_to_position, angle_to_register, position_slope, AngleRange, AxisParameters,
    HelioError, Real, RegisterValue, Vec3, REGISTER_CENTER,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ANGLE: &str = "angle";

/// Options for [`position_to_angle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoSolveOptions {
    /// Largest accepted remaining Newton step, in degrees.
    pub tolerance: f64,
    pub solver: BackendSolveOptions,
}

impl Default for ServoSolveOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            solver: BackendSolveOptions::default(),
        }
    }
}

/// Angle (degrees) whose polynomial value is `position`.
///
/// `prior_angle` seeds the solve. A solve that stops short of `tolerance`
/// is returned with `converged = false`.
pub fn position_to_angle(
    position: f64,
    polynomial: &Vec3,
    prior_angle: f64,
    opts: &ServoSolveOptions,
) -> Result<SolveResult<f64>> {
    if !position.is_finite() || !prior_angle.is_finite() || !polynomial.iter().all(|c| c.is_finite()) {
        return Err(HelioError::NonFinite("servo position solve input").into());
    }

    let mut ir = ProblemIR::new();
    let angle = ir.add_block(ParamBlock::new(ANGLE, 1));
    ir.add_residual_block(ResidualBlock::new(
        vec![angle],
        FactorKind::ServoPosition {
            position,
            polynomial: [polynomial[0], polynomial[1], polynomial[2]],
        },
        RobustLoss::None,
    ));
    let initial = HashMap::from([(ANGLE.to_string(), DVector::from_element(1, prior_angle))]);

    let backend = solve_problem(&ir, &initial, &opts.solver)?;
    let solved = backend
        .params
        .get(ANGLE)
        .map(|v| v[0])
        .ok_or_else(|| anyhow!("missing {} in solution", ANGLE))?;
    let result = SolveResult::from_backend(solved, &backend);

    let step = (angle_to_position(solved, polynomial) - position) / position_slope(solved, polynomial);
    log::debug!("position {position} -> angle {solved:.6} (remaining step {step:.3e})");
    if result.converged && !(step.abs() < opts.tolerance) {
        return Ok(result.fail(format!(
            "servo position {position} did not converge: remaining step {step:.3e} deg"
        )));
    }
    Ok(result)
}

/// Servo view of one axis: its polynomial, the angle offset between the
/// servo's zero and the model's zero, and the allowed angle range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoAxis {
    pub polynomial: Vec3,
    #[serde(default)]
    pub angle_offset: Real,
    pub angle_range: AngleRange,
}

impl Default for ServoAxis {
    fn default() -> Self {
        Self {
            polynomial: helio_core::default_polynomial(),
            angle_offset: 0.0,
            angle_range: AngleRange::default(),
        }
    }
}

impl ServoAxis {
    pub fn from_axis(axis: &AxisParameters, angle_offset: Real) -> Self {
        Self {
            polynomial: axis.polynomial,
            angle_offset,
            angle_range: axis.angle_range,
        }
    }

    pub fn clamp_angle(&self, angle: Real) -> Real {
        self.angle_range.clamp(angle)
    }

    /// Register value to command for `angle`.
    ///
    /// The angle is clamped to the axis limits before conversion.
    pub fn goal_position(&self, angle: Real) -> Result<RegisterValue, HelioError> {
        let servo_angle = self.clamp_angle(angle) - self.angle_offset;
        angle_to_register(servo_angle, &self.polynomial)
    }

    /// Model angle for a register reading.
    pub fn angle_from_register(
        &self,
        register: RegisterValue,
        opts: &ServoSolveOptions,
    ) -> Result<SolveResult<Real>> {
        let position = register as f64;
        let prior = (position - self.polynomial[0]) / self.polynomial[1];
        let prior = if prior.is_finite() { prior } else { 0.0 };
        let offset = self.angle_offset;
        Ok(position_to_angle(position, &self.polynomial, prior, opts)?.map(|a| a + offset))
    }

    /// Angle limits implied by register limits.
    pub fn range_from_registers(
        &self,
        minimum: RegisterValue,
        maximum: RegisterValue,
        opts: &ServoSolveOptions,
    ) -> Result<AngleRange> {
        let mut limits = [0.0; 2];
        for (limit, register) in limits.iter_mut().zip([minimum, maximum]) {
            let result = self.angle_from_register(register, opts)?;
            if !result.converged {
                return Err(anyhow!(
                    "register limit {} could not be converted: {}",
                    register,
                    result.error_message.unwrap_or_default()
                ));
            }
            *limit = result.solution;
        }
        Ok(AngleRange::new(limits[0].min(limits[1]), limits[0].max(limits[1])))
    }

    /// Shift `c0` so the middle of the angle range maps to the center register.
    pub fn center_polynomial_on_limits(&mut self) {
        let middle = self.angle_range.center() - self.angle_offset;
        let position = angle_to_position(middle, &self.polynomial);
        self.polynomial[0] += REGISTER_CENTER as f64 - position;
    }
}
