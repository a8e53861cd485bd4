//! Joint fit of heliostat parameters from camera observations.
//!
//! All observations share the five parameter blocks described in
//! [`crate::params::ham`]; each contributes one 2D residual block (reflected
//! ray distance and outside-the-mirror penalty). Calibration is normally run
//! in stages: float one group, fix the rest, repeat.

use crate::backend::{solve_problem, BackendSolveOptions};
use crate::factors::calibration::calibration_terms;
use crate::ir::{Bound, FactorKind, ParamBlock, ParamValues, ProblemIR, ResidualBlock, RobustLoss};
use crate::params::ham::{
    pack_ham, position_of, unpack_ham, MIRROR_OFFSET, MIRROR_OFFSET_DIM, POLYNOMIALS,
    POLYNOMIALS_DIM, POSITION, POSITION_DIM, ROTATION_AXES, ROTATION_AXES_DIM, ROTATION_Y,
    ROTATION_Y_DIM,
};
use crate::result::SolveResult;
use anyhow::Result;
use helio_core::{CalibrationObservation, HamParameters, HelioError};
use serde::{Deserialize, Serialize};

/// Fix/float toggles and physical constants for [`solve_calibration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    pub fix_position: bool,
    pub fix_rotation_y: bool,
    pub fix_rotation_axes: bool,
    pub fix_mirror_offset: bool,
    pub fix_polynomials: bool,
    /// Physical mirror diameter; intersections beyond half of it are penalized.
    pub mirror_diameter: f64,
    /// `[lower, upper]` for the mirror offset when it floats.
    pub mirror_offset_bounds: Option<[f64; 2]>,
    /// `[lower, upper]` per coefficient `c0, c1, c2`, applied to both axes
    /// when the polynomials float.
    pub polynomial_bounds: Option<[[f64; 2]; 3]>,
    /// Robust loss applied per observation.
    pub loss: RobustLoss,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            fix_position: false,
            fix_rotation_y: true,
            fix_rotation_axes: true,
            fix_mirror_offset: true,
            fix_polynomials: true,
            mirror_diameter: 0.35,
            mirror_offset_bounds: None,
            polynomial_bounds: None,
            loss: RobustLoss::None,
        }
    }
}

/// Summary of per-observation residual norms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualReport {
    /// Observations with a finite residual.
    pub count: usize,
    /// Observations whose residual could not be evaluated.
    pub non_finite: usize,
    pub mean: f64,
    pub rms: f64,
    pub max: f64,
}

/// Build the calibration IR and initial values.
pub fn build_calibration_ir(
    observations: &[CalibrationObservation],
    prior: &HamParameters,
    opts: &CalibrationOptions,
) -> Result<(ProblemIR, ParamValues)> {
    if observations.is_empty() {
        return Err(HelioError::NotEnoughData {
            what: "calibration observations",
            required: 1,
            got: 0,
        }
        .into());
    }
    prior.validate_ranges()?;

    let mut ir = ProblemIR::new();
    let position =
        ir.add_block(ParamBlock::new(POSITION, POSITION_DIM).fixed(opts.fix_position));
    let rotation_y =
        ir.add_block(ParamBlock::new(ROTATION_Y, ROTATION_Y_DIM).fixed(opts.fix_rotation_y));
    let rotation_axes = ir.add_block(
        ParamBlock::new(ROTATION_AXES, ROTATION_AXES_DIM).fixed(opts.fix_rotation_axes),
    );
    let polynomial_bounds = opts
        .polynomial_bounds
        .filter(|_| !opts.fix_polynomials)
        .into_iter()
        .flat_map(|bounds| {
            (0..POLYNOMIALS_DIM).map(move |i| Bound::new(i, bounds[i % 3][0], bounds[i % 3][1]))
        });
    let polynomials = ir.add_block(
        ParamBlock::new(POLYNOMIALS, POLYNOMIALS_DIM)
            .fixed(opts.fix_polynomials)
            .with_bounds(polynomial_bounds),
    );
    let offset_bounds = opts
        .mirror_offset_bounds
        .filter(|_| !opts.fix_mirror_offset)
        .map(|[lower, upper]| Bound::new(0, lower, upper));
    let mirror_offset = ir.add_block(
        ParamBlock::new(MIRROR_OFFSET, MIRROR_OFFSET_DIM)
            .fixed(opts.fix_mirror_offset)
            .with_bounds(offset_bounds),
    );

    let mirror_radius = opts.mirror_diameter / 2.0;
    for observation in observations {
        ir.add_residual_block(ResidualBlock::new(
            vec![position, rotation_y, rotation_axes, polynomials, mirror_offset],
            FactorKind::CalibrationRay {
                observation: Box::new(observation.clone()),
                mirror_radius,
            },
            opts.loss,
        ));
    }

    Ok((ir, pack_ham(prior)))
}

/// Fit the floating parameter groups of `prior` to `observations`.
///
/// The returned parameters keep the prior's angle ranges.
pub fn solve_calibration(
    observations: &[CalibrationObservation],
    prior: &HamParameters,
    opts: &CalibrationOptions,
    backend_opts: &BackendSolveOptions,
) -> Result<SolveResult<HamParameters>> {
    let (ir, initial) = build_calibration_ir(observations, prior, opts)?;
    log::debug!(
        "calibration: {} observations, {} parameter blocks",
        ir.residuals.len(),
        ir.params.len()
    );

    let backend = solve_problem(&ir, &initial, backend_opts)?;
    let params = unpack_ham(&backend.params, prior)?;
    let result = SolveResult::from_backend(params, &backend);

    if result.converged {
        log::info!(
            "calibration converged: cost {:.6e} -> {:.6e}, position {:?}",
            result.initial_cost,
            result.final_cost,
            position_of(&backend.params).map(|p| [p.x, p.y, p.z])
        );
    } else {
        log::warn!(
            "calibration did not converge: {}",
            result.error_message.as_deref().unwrap_or("unknown")
        );
    }
    Ok(result)
}

/// Norm of one observation's `(distance, outside)` residual under `params`.
///
/// Unlike the optimizer cost, degenerate observations are not zeroed: the
/// result is non-finite so reports can flag them.
pub fn get_residual(
    observation: &CalibrationObservation,
    params: &HamParameters,
    mirror_diameter: f64,
) -> f64 {
    let (distance, outside) = calibration_terms(params, observation, mirror_diameter / 2.0);
    distance.hypot(outside)
}

/// Residual statistics over a batch.
pub fn residual_report(
    observations: &[CalibrationObservation],
    params: &HamParameters,
    mirror_diameter: f64,
) -> ResidualReport {
    let residuals: Vec<f64> = observations
        .iter()
        .map(|o| get_residual(o, params, mirror_diameter))
        .collect();
    let finite: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
    let count = finite.len();
    let (mean, rms, max) = if count == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let n = count as f64;
        (
            finite.iter().sum::<f64>() / n,
            (finite.iter().map(|r| r * r).sum::<f64>() / n).sqrt(),
            finite.iter().copied().fold(0.0, f64::max),
        )
    };
    ResidualReport {
        count,
        non_finite: residuals.len() - count,
        mean,
        rms,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helio_core::synthetic::{angle_grid, observations, reference_parameters};
    use helio_core::{Ray, Vec3};

    #[test]
    fn empty_batch_is_rejected() {
        let err = solve_calibration(
            &[],
            &HamParameters::default(),
            &CalibrationOptions::default(),
            &BackendSolveOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HelioError>(),
            Some(HelioError::NotEnoughData { .. })
        ));
    }

    #[test]
    fn fixed_groups_get_no_bounds() {
        let obs = observations(
            &reference_parameters(),
            &Vec3::new(0.0, -2.0, 2.0),
            &angle_grid(&[0.0], &[0.0]),
            3.0,
        );
        let opts = CalibrationOptions {
            mirror_offset_bounds: Some([0.13, 0.15]),
            ..CalibrationOptions::default()
        };
        let (ir, initial) = build_calibration_ir(&obs, &reference_parameters(), &opts).unwrap();
        let offset = ir.block_by_name(MIRROR_OFFSET).unwrap();
        assert!(offset.bounds.is_empty());
        assert!(offset.fixed);
        assert_eq!(initial.len(), 5);

        let floating = CalibrationOptions {
            fix_mirror_offset: false,
            ..opts
        };
        let (ir, _) = build_calibration_ir(&obs, &reference_parameters(), &floating).unwrap();
        let offset = ir.block_by_name(MIRROR_OFFSET).unwrap();
        assert_eq!(offset.bounds, vec![Bound::new(0, 0.13, 0.15)]);
    }

    #[test]
    fn report_counts_degenerate_observations() {
        let params = reference_parameters();
        let mut obs = observations(
            &params,
            &Vec3::new(0.3, -2.0, 1.5),
            &angle_grid(&[-10.0, 10.0], &[0.0, 15.0]),
            3.0,
        );
        obs.push(CalibrationObservation {
            camera_ray: Ray::new(Vec3::zeros(), Vec3::zeros()),
            ..obs[0].clone()
        });
        let report = residual_report(&obs, &params, 0.35);
        assert_eq!(report.count, 4);
        assert_eq!(report.non_finite, 1);
        assert!(report.max < 1e-9);
    }
}
