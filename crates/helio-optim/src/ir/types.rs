use anyhow::{ensure, Result};
use helio_core::{CalibrationObservation, HamParameters, Ray};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameter values keyed by block name.
pub type ParamValues = HashMap<String, DVector<f64>>;

/// Index of a parameter block within its [`ProblemIR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// Box constraint on one scalar of a parameter block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub fn new(index: usize, lower: f64, upper: f64) -> Self {
        Self {
            index,
            lower,
            upper,
        }
    }
}

/// Robust loss wrapped around a residual block.
///
/// One residual block per observation makes the loss per observation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
    Cauchy {
        scale: f64,
    },
    Arctan {
        scale: f64,
    },
}

/// Residual models understood by every backend.
///
/// A kind fixes both the residual length and the parameter blocks it reads.
/// Measurements and constant model parts travel inside the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// Servo polynomial at the angle minus the observed position.
    ///
    /// Blocks: `[angle]` (1, degrees).
    ServoPosition { position: f64, polynomial: [f64; 3] },
    /// Mirror normal minus the target direction.
    ///
    /// Blocks: `[axis_angles]` (2, degrees).
    MirrorNormal {
        model: Box<HamParameters>,
        target: [f64; 3],
    },
    /// Offset of `target` from the ray `source → mirror center` reflected off
    /// the mirror, plus the facing penalty.
    ///
    /// Blocks: `[axis_angles]`.
    PointToPoint {
        model: Box<HamParameters>,
        source: [f64; 3],
        target: [f64; 3],
        facing_weight: f64,
    },
    /// Offset of `target` from the reflected fixed incident direction, plus a
    /// one-sided penalty when the mirror faces away from the target.
    ///
    /// Blocks: `[axis_angles]`.
    VectorToPoint {
        model: Box<HamParameters>,
        incident: [f64; 3],
        target: [f64; 3],
        facing_weight: f64,
    },
    /// Reflected camera ray against the observed world point, plus the
    /// outside-the-mirror penalty.
    ///
    /// Blocks: `[position(3), rotation_y(1), rotation_axes(4), polynomials(6), mirror_offset(1)]`.
    CalibrationRay {
        observation: Box<CalibrationObservation>,
        mirror_radius: f64,
    },
    /// Reflected ray off a free plane `[a, b, c, d]` against a world point.
    ///
    /// Blocks: `[plane]` (4).
    MirrorPlaneRay { ray: Box<Ray>, point: [f64; 3] },
    /// Keeps the normal part of a `[a, b, c, d]` plane at unit length.
    ///
    /// Blocks: `[plane]` (4).
    UnitNormPrior { weight: f64 },
    /// Rotated `pre` direction minus `post` direction.
    ///
    /// Blocks: `[rodrigues]` (3).
    RotationAlignment { pre: [f64; 3], post: [f64; 3] },
}

impl FactorKind {
    pub fn residual_dim(&self) -> usize {
        match self {
            FactorKind::ServoPosition { .. } | FactorKind::UnitNormPrior { .. } => 1,
            FactorKind::CalibrationRay { .. } => 2,
            FactorKind::MirrorNormal { .. }
            | FactorKind::MirrorPlaneRay { .. }
            | FactorKind::RotationAlignment { .. } => 3,
            FactorKind::PointToPoint { .. } | FactorKind::VectorToPoint { .. } => 4,
        }
    }

    /// Lengths of the parameter blocks the factor reads, in call order.
    pub fn param_dims(&self) -> &'static [usize] {
        match self {
            FactorKind::ServoPosition { .. } => &[1],
            FactorKind::MirrorNormal { .. }
            | FactorKind::PointToPoint { .. }
            | FactorKind::VectorToPoint { .. } => &[2],
            FactorKind::CalibrationRay { .. } => &[3, 1, 4, 6, 1],
            FactorKind::MirrorPlaneRay { .. } | FactorKind::UnitNormPrior { .. } => &[4],
            FactorKind::RotationAlignment { .. } => &[3],
        }
    }
}

/// A named vector of unknowns.
///
/// Blocks are held constant or optimized as a whole; bounds apply per scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBlock {
    pub name: String,
    pub dim: usize,
    pub fixed: bool,
    pub bounds: Vec<Bound>,
}

impl ParamBlock {
    pub fn new(name: impl Into<String>, dim: usize) -> Self {
        Self {
            name: name.into(),
            dim,
            fixed: false,
            bounds: Vec::new(),
        }
    }

    pub fn fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_bounds(mut self, bounds: impl IntoIterator<Item = Bound>) -> Self {
        self.bounds.extend(bounds);
        self
    }
}

/// One factor applied to a list of parameter blocks.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    /// Same order as [`FactorKind::param_dims`].
    pub params: Vec<ParamId>,
    pub loss: RobustLoss,
    pub factor: FactorKind,
}

impl ResidualBlock {
    pub fn new(params: Vec<ParamId>, factor: FactorKind, loss: RobustLoss) -> Self {
        Self {
            params,
            loss,
            factor,
        }
    }

    pub fn residual_dim(&self) -> usize {
        self.factor.residual_dim()
    }
}

/// A least-squares problem described independently of any solver.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, block: ParamBlock) -> ParamId {
        self.params.push(block);
        ParamId(self.params.len() - 1)
    }

    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    pub fn block(&self, id: ParamId) -> Option<&ParamBlock> {
        self.params.get(id.0)
    }

    pub fn block_by_name(&self, name: &str) -> Option<&ParamBlock> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Nothing is left to optimize.
    pub fn is_fully_fixed(&self) -> bool {
        self.params.iter().all(|p| p.fixed)
    }

    /// Parameter values read by `residual`, checked against the block sizes.
    pub fn gather(
        &self,
        residual: &ResidualBlock,
        values: &ParamValues,
    ) -> Result<Vec<DVector<f64>>> {
        residual
            .params
            .iter()
            .map(|&id| {
                let Some(block) = self.block(id) else {
                    anyhow::bail!("no parameter block {:?}", id);
                };
                let Some(value) = values.get(&block.name) else {
                    anyhow::bail!("no value for parameter block '{}'", block.name);
                };
                ensure!(
                    value.len() == block.dim,
                    "block '{}' holds {} values, expected {}",
                    block.name,
                    value.len(),
                    block.dim
                );
                Ok(value.clone())
            })
            .collect()
    }

    /// Reject duplicate names, bad bounds and factor/block size mismatches.
    pub fn validate(&self) -> Result<()> {
        for (i, block) in self.params.iter().enumerate() {
            ensure!(
                self.params[..i].iter().all(|other| other.name != block.name),
                "parameter block '{}' declared twice",
                block.name
            );
            for bound in &block.bounds {
                ensure!(
                    bound.index < block.dim && bound.lower <= bound.upper,
                    "invalid bound {:?} on block '{}' of size {}",
                    bound,
                    block.name,
                    block.dim
                );
            }
        }

        for (r, residual) in self.residuals.iter().enumerate() {
            let dims = residual.factor.param_dims();
            ensure!(
                residual.params.len() == dims.len(),
                "residual {} reads {} blocks, its factor needs {}",
                r,
                residual.params.len(),
                dims.len()
            );
            for (&id, &dim) in residual.params.iter().zip(dims) {
                let Some(block) = self.block(id) else {
                    anyhow::bail!("residual {} reads missing block {:?}", r, id);
                };
                ensure!(
                    block.dim == dim,
                    "residual {} needs a {}-vector for '{}', block has {}",
                    r,
                    dim,
                    block.name,
                    block.dim
                );
            }
        }
        Ok(())
    }
}
