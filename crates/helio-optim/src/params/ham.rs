//! Packing of [`HamParameters`] into the calibrator's shared parameter blocks.
//!
//! Block layout:
//! - `position`: `[x, y, z]`
//! - `rotation_y`: `[degrees]`
//! - `rotation_axes`: `[inc1, az1, inc2, az2]`, polar angles in radians of the
//!   two rotation axes (see [`polar_to_cartesian`])
//! - `polynomials`: `[a1c0, a1c1, a1c2, a2c0, a2c1, a2c2]`
//! - `mirror_offset`: `[offset]`
//!
//! Axis rotation axes are stored as polar angles so that they stay unit length
//! without a manifold. Angle ranges do not take part in the fit and are copied
//! from the prior when unpacking.

use crate::ir::ParamValues;
use anyhow::{anyhow, ensure, Result};
use helio_core::{
    cartesian_to_polar, polar_to_cartesian, AngleRange, AxisParameters, HamParameters, Vec3,
};
use nalgebra::{DVector, DVectorView, RealField, Vector3};

pub const POSITION: &str = "position";
pub const ROTATION_Y: &str = "rotation_y";
pub const ROTATION_AXES: &str = "rotation_axes";
pub const POLYNOMIALS: &str = "polynomials";
pub const MIRROR_OFFSET: &str = "mirror_offset";

pub const POSITION_DIM: usize = 3;
pub const ROTATION_Y_DIM: usize = 1;
pub const ROTATION_AXES_DIM: usize = 4;
pub const POLYNOMIALS_DIM: usize = 6;
pub const MIRROR_OFFSET_DIM: usize = 1;

/// Pack parameters into named blocks.
pub fn pack_ham(params: &HamParameters) -> ParamValues {
    let (inc1, az1) = cartesian_to_polar(&params.axis1.rotation_axis);
    let (inc2, az2) = cartesian_to_polar(&params.axis2.rotation_axis);
    let p1 = &params.axis1.polynomial;
    let p2 = &params.axis2.polynomial;

    let mut blocks = ParamValues::new();
    blocks.insert(
        POSITION.to_string(),
        DVector::from_column_slice(params.position.as_slice()),
    );
    blocks.insert(
        ROTATION_Y.to_string(),
        DVector::from_element(1, params.rotation_y),
    );
    blocks.insert(
        ROTATION_AXES.to_string(),
        DVector::from_vec(vec![inc1, az1, inc2, az2]),
    );
    blocks.insert(
        POLYNOMIALS.to_string(),
        DVector::from_vec(vec![p1[0], p1[1], p1[2], p2[0], p2[1], p2[2]]),
    );
    blocks.insert(
        MIRROR_OFFSET.to_string(),
        DVector::from_element(1, params.mirror_offset),
    );
    blocks
}

/// Assemble model parameters from block views.
///
/// Used inside residuals, so it must stay generic. Angle ranges are set to the
/// default; the cost functions never read them.
pub fn ham_from_blocks<T: RealField>(
    position: DVectorView<'_, T>,
    rotation_y: DVectorView<'_, T>,
    rotation_axes: DVectorView<'_, T>,
    polynomials: DVectorView<'_, T>,
    mirror_offset: DVectorView<'_, T>,
) -> HamParameters<T> {
    debug_assert!(position.len() >= POSITION_DIM, "position must have 3 params");
    debug_assert!(rotation_axes.len() >= ROTATION_AXES_DIM, "rotation axes must have 4 params");
    debug_assert!(polynomials.len() >= POLYNOMIALS_DIM, "polynomials must have 6 params");

    let axis = |inc: usize, poly: usize| AxisParameters {
        polynomial: Vector3::new(
            polynomials[poly].clone(),
            polynomials[poly + 1].clone(),
            polynomials[poly + 2].clone(),
        ),
        rotation_axis: polar_to_cartesian(rotation_axes[inc].clone(), rotation_axes[inc + 1].clone()),
        angle_range: AngleRange::default(),
    };

    HamParameters {
        position: Vector3::new(position[0].clone(), position[1].clone(), position[2].clone()),
        rotation_y: rotation_y[0].clone(),
        axis1: axis(0, 0),
        axis2: axis(2, 3),
        mirror_offset: mirror_offset[0].clone(),
    }
}

fn block<'a>(blocks: &'a ParamValues, name: &str, dim: usize) -> Result<DVectorView<'a, f64>> {
    let v = blocks
        .get(name)
        .ok_or_else(|| anyhow!("missing {} in solution", name))?;
    ensure!(
        v.len() == dim,
        "{} requires {}D vector, got {}",
        name,
        dim,
        v.len()
    );
    Ok(v.as_view())
}

/// Unpack solved blocks; angle ranges are taken from `prior`.
pub fn unpack_ham(
    blocks: &ParamValues,
    prior: &HamParameters,
) -> Result<HamParameters> {
    let mut params = ham_from_blocks(
        block(blocks, POSITION, POSITION_DIM)?,
        block(blocks, ROTATION_Y, ROTATION_Y_DIM)?,
        block(blocks, ROTATION_AXES, ROTATION_AXES_DIM)?,
        block(blocks, POLYNOMIALS, POLYNOMIALS_DIM)?,
        block(blocks, MIRROR_OFFSET, MIRROR_OFFSET_DIM)?,
    );
    params.axis1.angle_range = prior.axis1.angle_range;
    params.axis2.angle_range = prior.axis2.angle_range;
    Ok(params)
}

/// Position block as a vector, convenient for logging.
pub fn position_of(blocks: &ParamValues) -> Option<Vec3> {
    blocks
        .get(POSITION)
        .filter(|v| v.len() == POSITION_DIM)
        .map(|v| Vec3::new(v[0], v[1], v[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use helio_core::synthetic::reference_parameters;

    #[test]
    fn pack_unpack_restores_parameters() {
        let mut params = reference_parameters();
        params.axis1.rotation_axis = Vec3::new(0.05, -1.0, 0.02).normalize();
        params.axis2.polynomial = Vec3::new(2040.0, 11.3, 2.0e-4);

        let blocks = pack_ham(&params);
        let back = unpack_ham(&blocks, &params).unwrap();

        assert!((back.position - params.position).norm() < 1e-12);
        assert!((back.rotation_y - params.rotation_y).abs() < 1e-12);
        assert!((back.axis1.rotation_axis - params.axis1.rotation_axis).norm() < 1e-12);
        assert!((back.axis2.rotation_axis - params.axis2.rotation_axis).norm() < 1e-12);
        assert!((back.axis2.polynomial - params.axis2.polynomial).norm() < 1e-12);
        assert!((back.mirror_offset - params.mirror_offset).abs() < 1e-12);
        assert_eq!(back.axis1.angle_range, params.axis1.angle_range);
        assert_eq!(position_of(&blocks), Some(params.position));
    }

    #[test]
    fn unpack_reports_missing_block() {
        let params = reference_parameters();
        let mut blocks = pack_ham(&params);
        blocks.remove(POLYNOMIALS);
        let err = unpack_ham(&blocks, &params).unwrap_err();
        assert!(err.to_string().contains("polynomials"));
    }
}
