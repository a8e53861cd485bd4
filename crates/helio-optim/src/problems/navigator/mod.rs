//! Inverse kinematics: axis angles that produce a requested reflection.
//!
//! The raw solves ([`solve_normal`], [`solve_point_to_point`],
//! [`solve_vector_to_point`]) optimize a 2D `[axis1, axis2]` block against a
//! fixed model and know nothing about axis ranges. [`solve_constrained`] wraps
//! any of them with range enforcement and flip disambiguation.

mod constraints;

pub use constraints::{constrain_angles, flip, validate};

use constraints::snap_into_range;

use crate::backend::{solve_problem, BackendSolveOptions};
use crate::ir::{FactorKind, ParamBlock, ProblemIR, ResidualBlock, RobustLoss};
use crate::result::SolveResult;
use anyhow::{anyhow, ensure, Result};
use helio_core::{
    angle_between_deg, mirror_center_and_normal, AxisAngles, HamParameters, HelioError, Vec3,
};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const AXIS_ANGLES: &str = "axis_angles";

/// Below this separation the two points of a point-to-point request are
/// treated as one.
const COINCIDENT_POINTS: f64 = 1e-4;

/// A warm start that ends further than this from its direction is retried.
const WARM_START_TOLERANCE_DEG: f64 = 1e-2;

/// Offsets from the initial angles for warm-start retries, degrees.
const WARM_START_RETRIES: [(f64, f64); 4] =
    [(30.0, 20.0), (-30.0, -20.0), (30.0, -20.0), (-30.0, 20.0)];

/// Options shared by the navigator solves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorOptions {
    /// Weight of the penalty applied when the mirror faces away from the
    /// target in [`solve_vector_to_point`].
    pub facing_penalty_weight: f64,
    /// Same penalty in [`solve_point_to_point`].
    pub point_to_point_facing_weight: f64,
    /// Return `Err(ConstraintViolation)` instead of a non-converged result when
    /// no in-range solution is found.
    pub throw_if_outside_constraints: bool,
    pub solver: BackendSolveOptions,
}

impl Default for NavigatorOptions {
    fn default() -> Self {
        Self {
            facing_penalty_weight: 1.0,
            point_to_point_facing_weight: 1000.0,
            throw_if_outside_constraints: false,
            solver: BackendSolveOptions::default(),
        }
    }
}

fn unit(v: &Vec3, what: &'static str) -> Result<Vec3> {
    if !v.iter().all(|c| c.is_finite()) {
        return Err(HelioError::NonFinite(what).into());
    }
    let norm = v.norm();
    ensure!(norm > 0.0, "{} must be non-zero", what);
    Ok(v / norm)
}

/// Sum of two unit vectors, normalized; `None` when they cancel.
fn bisector(a: &Vec3, b: &Vec3) -> Option<Vec3> {
    let sum = a + b;
    let norm = sum.norm();
    (norm > 1e-9).then(|| sum / norm)
}

fn solve_angles(
    factor: FactorKind,
    initial: &AxisAngles,
    opts: &NavigatorOptions,
) -> Result<SolveResult<AxisAngles>> {
    if !initial.is_finite() {
        return Err(HelioError::NonFinite("initial axis angles").into());
    }
    let mut ir = ProblemIR::new();
    let angles = ir.add_block(ParamBlock::new(AXIS_ANGLES, 2));
    ir.add_residual_block(ResidualBlock::new(vec![angles], factor, RobustLoss::None));
    let start = HashMap::from([(
        AXIS_ANGLES.to_string(),
        DVector::from_vec(vec![initial.axis1, initial.axis2]),
    )]);

    let backend = solve_problem(&ir, &start, &opts.solver)?;
    let solved = backend
        .params
        .get(AXIS_ANGLES)
        .ok_or_else(|| anyhow!("missing {} in solution", AXIS_ANGLES))?;
    let result = SolveResult::from_backend(AxisAngles::new(solved[0], solved[1]), &backend);
    if result.converged && !result.solution.is_finite() {
        return Ok(result.fail("solver produced non-finite axis angles"));
    }
    Ok(result)
}

/// Angles whose mirror normal points along `target_normal`.
pub fn solve_normal(
    params: &HamParameters,
    target_normal: &Vec3,
    initial: &AxisAngles,
    opts: &NavigatorOptions,
) -> Result<SolveResult<AxisAngles>> {
    let target = unit(target_normal, "target normal")?;
    let result = solve_angles(
        FactorKind::MirrorNormal {
            model: Box::new(params.clone()),
            target: target.into(),
        },
        initial,
        opts,
    )?;

    let (_, normal) = mirror_center_and_normal(&result.solution, params);
    log::debug!(
        "solve_normal: angles ({:.4}, {:.4}), {:.2e} deg from target",
        result.solution.axis1,
        result.solution.axis2,
        angle_between_deg(&normal, &target)
    );
    Ok(result)
}

/// Angles whose normal points along `direction`, as a starting point for a
/// reflection solve.
///
/// The normal residual has stationary points away from the answer (a normal
/// antipodal to `direction`, or an axis that cannot move the normal). When
/// the solve from `initial` misses or leaves the axis ranges, it is repeated
/// from offset starts. Hitting the direction ranks first, then staying in
/// range, then the remaining miss.
fn warm_start(
    params: &HamParameters,
    direction: &Vec3,
    initial: &AxisAngles,
    opts: &NavigatorOptions,
) -> Result<AxisAngles> {
    let mut best: Option<((bool, bool, f64), AxisAngles)> = None;
    for (d1, d2) in std::iter::once((0.0, 0.0)).chain(WARM_START_RETRIES) {
        let start = AxisAngles::new(initial.axis1 + d1, initial.axis2 + d2);
        let warm = solve_normal(params, direction, &start, opts)?;
        if !warm.solution.is_finite() {
            continue;
        }
        let (_, normal) = mirror_center_and_normal(&warm.solution, params);
        let miss = angle_between_deg(&normal, direction);
        if !miss.is_finite() {
            continue;
        }
        let on_target = warm.converged && miss < WARM_START_TOLERANCE_DEG;
        let in_range = validate(params, &snap_into_range(params, &warm.solution));
        if on_target && in_range {
            return Ok(warm.solution);
        }
        log::debug!(
            "warm start from ({:.2}, {:.2}) misses by {miss:.3} deg (in range: {in_range})",
            start.axis1,
            start.axis2
        );
        let rank = (!on_target, !in_range, miss);
        if best.map_or(true, |(closest, _)| rank < closest) {
            best = Some((rank, warm.solution));
        }
    }

    match best {
        Some(((_, _, miss), angles)) => {
            log::warn!("no in-range warm start on target, using one {miss:.3} deg off");
            Ok(angles)
        }
        None => {
            log::warn!("warm start failed, refining from initial angles");
            Ok(*initial)
        }
    }
}

/// Angles that reflect light from `source` onto `target`.
///
/// Warm-starts on the bisector of the directions from the pivot to both
/// points, then refines on the reflected-ray distance with a penalty against
/// facing away from `target`. When the two points coincide the mirror simply
/// faces them.
pub fn solve_point_to_point(
    params: &HamParameters,
    source: &Vec3,
    target: &Vec3,
    initial: &AxisAngles,
    opts: &NavigatorOptions,
) -> Result<SolveResult<AxisAngles>> {
    let pivot = params.position;
    if (source - target).norm() < COINCIDENT_POINTS {
        log::debug!("solve_point_to_point: source and target coincide, facing them");
        return solve_normal(params, &(source - pivot), initial, opts);
    }

    let to_source = unit(&(source - pivot), "direction to source")?;
    let to_target = unit(&(target - pivot), "direction to target")?;
    // Opposite sides of the pivot: face the target.
    let warm_target = bisector(&to_source, &to_target).unwrap_or(to_target);

    let start = warm_start(params, &warm_target, initial, opts)?;

    let result = solve_angles(
        FactorKind::PointToPoint {
            model: Box::new(params.clone()),
            source: (*source).into(),
            target: (*target).into(),
            facing_weight: opts.point_to_point_facing_weight,
        },
        &start,
        opts,
    )?;
    log::debug!(
        "solve_point_to_point: angles ({:.4}, {:.4}), cost {:.3e}",
        result.solution.axis1,
        result.solution.axis2,
        result.final_cost
    );
    Ok(result)
}

/// Angles that reflect light arriving along `incident` onto `target`.
pub fn solve_vector_to_point(
    params: &HamParameters,
    incident: &Vec3,
    target: &Vec3,
    initial: &AxisAngles,
    opts: &NavigatorOptions,
) -> Result<SolveResult<AxisAngles>> {
    let incident = unit(incident, "incident direction")?;
    let to_target = unit(&(target - params.position), "direction to target")?;
    let warm_target = bisector(&-incident, &to_target).unwrap_or(to_target);

    let start = warm_start(params, &warm_target, initial, opts)?;

    let result = solve_angles(
        FactorKind::VectorToPoint {
            model: Box::new(params.clone()),
            incident: incident.into(),
            target: (*target).into(),
            facing_weight: opts.facing_penalty_weight,
        },
        &start,
        opts,
    )?;
    log::debug!(
        "solve_vector_to_point: angles ({:.4}, {:.4}), cost {:.3e}",
        result.solution.axis1,
        result.solution.axis2,
        result.final_cost
    );
    Ok(result)
}

/// Run `solve` with range enforcement.
///
/// `Solve → Constrain → (changed → Solve → Constrain) → Validate`. At most one
/// re-solve is performed, started from the constrained angles because the
/// cost landscape differs on the other axis 1 branch. A final result outside
/// the ranges is returned with `converged = false`, or as
/// [`HelioError::ConstraintViolation`] when `throw_if_outside_constraints`.
pub fn solve_constrained<F>(
    params: &HamParameters,
    solve: F,
    initial: &AxisAngles,
    throw_if_outside_constraints: bool,
) -> Result<SolveResult<AxisAngles>>
where
    F: Fn(&AxisAngles) -> Result<SolveResult<AxisAngles>>,
{
    params.validate_ranges()?;

    let mut result = solve(initial)?;
    if !result.solution.is_finite() {
        return Ok(result.fail("solver produced non-finite axis angles"));
    }

    if constrain_angles(params, &mut result.solution, initial)? {
        let constrained = result.solution;
        log::debug!(
            "re-solving from constrained angles ({:.4}, {:.4})",
            constrained.axis1,
            constrained.axis2
        );
        result = solve(&constrained)?;
        if !result.solution.is_finite() {
            return Ok(result.fail("solver produced non-finite axis angles"));
        }
        constrain_angles(params, &mut result.solution, initial)?;
    }

    if validate(params, &result.solution) {
        return Ok(result);
    }

    let AxisAngles { axis1, axis2 } = result.solution;
    log::warn!("no in-range solution: ({axis1:.3}, {axis2:.3})");
    if throw_if_outside_constraints {
        return Err(HelioError::ConstraintViolation { axis1, axis2 }.into());
    }
    Ok(result.fail(format!(
        "axis angles ({axis1:.3}, {axis2:.3}) are outside the configured ranges"
    )))
}
