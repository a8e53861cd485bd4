//! Rotation aligning one set of directions with another.
//!
//! Typical use: orient a locally modeled direction (a sun position formula)
//! to directions measured in the world frame.

use crate::backend::{solve_problem, BackendSolveOptions};
use crate::factors::rotation::rodrigues_to_quaternion;
use crate::ir::{FactorKind, ParamBlock, ProblemIR, ResidualBlock, RobustLoss};
use crate::result::SolveResult;
use anyhow::{anyhow, Result};
use helio_core::{HelioError, Quat, Vec3};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const RODRIGUES: &str = "rodrigues";

/// Solved rotation in both representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationFrame {
    pub rotation: Quat,
    /// Axis times angle in radians.
    pub rodrigues: Vec3,
}

fn usable(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite()) && v.norm() > 0.0
}

/// Find `R` minimizing `Σ |R · normalize(preᵢ) - normalize(postᵢ)|²`.
pub fn solve(pre: &[Vec3], post: &[Vec3], opts: &BackendSolveOptions) -> Result<SolveResult<RotationFrame>> {
    if pre.len() != post.len() {
        return Err(HelioError::LengthMismatch {
            what: "post vectors",
            expected: pre.len(),
            got: post.len(),
        }
        .into());
    }
    if pre.len() < 2 {
        return Err(HelioError::NotEnoughData {
            what: "vector pairs",
            required: 2,
            got: pre.len(),
        }
        .into());
    }
    if !pre.iter().chain(post).all(usable) {
        return Err(HelioError::NonFinite("rotation frame vectors").into());
    }

    let mut ir = ProblemIR::new();
    let rodrigues = ir.add_block(ParamBlock::new(RODRIGUES, 3));
    for (a, b) in pre.iter().zip(post) {
        ir.add_residual_block(ResidualBlock::new(
            vec![rodrigues],
            FactorKind::RotationAlignment {
                pre: (*a).into(),
                post: (*b).into(),
            },
            RobustLoss::None,
        ));
    }
    let initial = HashMap::from([(RODRIGUES.to_string(), DVector::zeros(3))]);

    let backend = solve_problem(&ir, &initial, opts)?;
    let v = backend
        .params
        .get(RODRIGUES)
        .map(|v| Vec3::new(v[0], v[1], v[2]))
        .ok_or_else(|| anyhow!("missing {} in solution", RODRIGUES))?;
    let frame = RotationFrame {
        rotation: rodrigues_to_quaternion(&v),
        rodrigues: v,
    };
    log::debug!(
        "rotation frame: {:.4} deg about {:?}",
        frame.rotation.angle().to_degrees(),
        frame.rotation.axis().map(|a| [a.x, a.y, a.z])
    );
    Ok(SolveResult::from_backend(frame, &backend))
}
