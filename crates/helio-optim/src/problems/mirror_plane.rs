//! Fit a single reflecting plane from camera rays and the world points their
//! reflections were observed at.
//!
//! The plane is a free `[a, b, c, d]` block; residuals normalize it, and a
//! unit-norm prior removes the scale gauge. The cost cannot tell the two
//! normal orientations apart, so the solved normal is flipped to face the
//! observed points, and the center is moved to the mean ray intersection.

use crate::backend::{solve_problem, BackendSolveOptions};
use crate::factors::plane::plane_ray_residual_generic;
use crate::ir::{FactorKind, ParamBlock, ParamValues, ProblemIR, ResidualBlock, RobustLoss};
use crate::result::SolveResult;
use anyhow::{anyhow, Result};
use helio_core::{HelioError, Plane, Ray, Vec3, Vec4};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

const PLANE: &str = "plane";

/// Options for [`solve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneSolveOptions {
    /// Weight of the `|(a, b, c)|² = 1` prior.
    pub unit_norm_weight: f64,
    /// Robust loss applied per ray/point pair.
    pub loss: RobustLoss,
    pub solver: BackendSolveOptions,
}

impl Default for PlaneSolveOptions {
    fn default() -> Self {
        Self {
            unit_norm_weight: 1.0,
            loss: RobustLoss::None,
            solver: BackendSolveOptions::default(),
        }
    }
}

fn check_pairs(rays: usize, points: usize) -> Result<(), HelioError> {
    if rays != points {
        return Err(HelioError::LengthMismatch {
            what: "world points",
            expected: rays,
            got: points,
        });
    }
    if rays < 2 {
        return Err(HelioError::NotEnoughData {
            what: "ray/point pairs",
            required: 2,
            got: rays,
        });
    }
    Ok(())
}

/// Build the plane IR and the initial `[a, b, c, d]`.
///
/// The initial plane sits one direction length along the first ray and faces
/// back along it.
pub fn build_plane_ir(
    camera_rays: &[Ray],
    world_points: &[Vec3],
    opts: &PlaneSolveOptions,
) -> Result<(ProblemIR, ParamValues)> {
    check_pairs(camera_rays.len(), world_points.len())?;

    let mut ir = ProblemIR::new();
    let plane = ir.add_block(ParamBlock::new(PLANE, 4));
    for (ray, point) in camera_rays.iter().zip(world_points) {
        ir.add_residual_block(ResidualBlock::new(
            vec![plane],
            FactorKind::MirrorPlaneRay {
                ray: Box::new(ray.clone()),
                point: (*point).into(),
            },
            opts.loss,
        ));
    }
    ir.add_residual_block(ResidualBlock::new(
        vec![plane],
        FactorKind::UnitNormPrior {
            weight: opts.unit_norm_weight,
        },
        RobustLoss::None,
    ));

    let first = &camera_rays[0];
    let initial_plane = Plane::new(first.point_at(1.0), -first.direction);
    let abcd = initial_plane.abcd();
    let initial = ParamValues::from([(
        PLANE.to_string(),
        DVector::from_column_slice(abcd.as_slice()),
    )]);
    Ok((ir, initial))
}

/// Fit the mirror plane.
pub fn solve(
    camera_rays: &[Ray],
    world_points: &[Vec3],
    opts: &PlaneSolveOptions,
) -> Result<SolveResult<Plane>> {
    let (ir, initial) = build_plane_ir(camera_rays, world_points, opts)?;
    let backend = solve_problem(&ir, &initial, &opts.solver)?;
    let abcd = backend
        .params
        .get(PLANE)
        .map(|v| Vec4::new(v[0], v[1], v[2], v[3]))
        .ok_or_else(|| anyhow!("missing {} in solution", PLANE))?;

    let mut plane = Plane::from_abcd(&abcd);

    let mean_point = world_points.iter().sum::<Vec3>() / world_points.len() as f64;
    if plane.signed_distance(&mean_point) < 0.0 {
        plane.normal = -plane.normal;
    }

    let hits: Vec<Vec3> = camera_rays
        .iter()
        .map(|ray| plane.intersect(ray))
        .filter(|p| p.iter().all(|c| c.is_finite()))
        .collect();
    if !hits.is_empty() {
        plane.center = hits.iter().sum::<Vec3>() / hits.len() as f64;
    }

    log::debug!(
        "mirror plane: center {:?}, normal {:?}, cost {:.3e} -> {:.3e}",
        plane.center.as_slice(),
        plane.normal.as_slice(),
        backend.initial_cost,
        backend.final_cost
    );
    Ok(SolveResult::from_backend(plane, &backend))
}

/// Norm of the reflected-ray offset of `point` for plane `abcd`.
pub fn get_residual(abcd: &Vec4, ray: &Ray, point: &Vec3) -> f64 {
    let abcd = DVector::from_column_slice(abcd.as_slice());
    plane_ray_residual_generic(abcd.as_view(), ray, (*point).into()).norm()
}
