//! Axis range enforcement and 180° flip disambiguation.
//!
//! A two-axis mount reaches every mirror plane twice: `(a1, a2)` and
//! `(a1 ± 180°, -a2)` give the same plane. The rules here pick the in-range
//! representative that keeps axis 1 closest to where it started. This is a
//! heuristic favouring short moves, not a global optimum.

use helio_core::{AngleRange, AxisAngles, HamParameters, HelioError};

/// Solver round-off past a range limit, degrees. Angles this close outside a
/// limit are moved onto it rather than spun.
const LIMIT_SNAP: f64 = 1e-6;

fn snap_to_limit(angle: f64, range: &AngleRange) -> f64 {
    if angle < range.minimum && range.minimum - angle <= LIMIT_SNAP {
        range.minimum
    } else if angle > range.maximum && angle - range.maximum <= LIMIT_SNAP {
        range.maximum
    } else {
        angle
    }
}

/// `angles` with round-off past a range limit moved onto the limit.
pub(crate) fn snap_into_range(params: &HamParameters, angles: &AxisAngles) -> AxisAngles {
    AxisAngles::new(
        snap_to_limit(angles.axis1, &params.axis1.angle_range),
        snap_to_limit(angles.axis2, &params.axis2.angle_range),
    )
}

/// `true` iff both angles lie within their configured ranges.
pub fn validate(params: &HamParameters, angles: &AxisAngles) -> bool {
    params.contains(angles)
}

fn flipped(angles: &AxisAngles, axis1_shift: f64) -> AxisAngles {
    AxisAngles::new(angles.axis1 + axis1_shift, -angles.axis2)
}

/// Bring `angles` into range and minimize axis 1 travel from `initial`.
///
/// 0. Angles within round-off of a range limit are moved onto it.
/// 1. Spin axis 1 by multiples of 180° until it lies in its range; every odd
///    spin negates axis 2.
/// 2. While axis 1 sits more than 90° away from `initial.axis1`, try the
///    complementary 180° flip; keep it only if it is valid and shortens the
///    travel.
///
/// Returns whether `angles` changed. If the changed angles are invalid the
/// input is restored and `false` is returned. Applying it twice changes
/// nothing the second time.
pub fn constrain_angles(
    params: &HamParameters,
    angles: &mut AxisAngles,
    initial: &AxisAngles,
) -> Result<bool, HelioError> {
    params.validate_ranges()?;
    if !angles.is_finite() {
        return Err(HelioError::NonFinite("axis angles"));
    }
    if !initial.is_finite() {
        return Err(HelioError::NonFinite("initial axis angles"));
    }

    let original = *angles;
    let range = params.axis1.angle_range;
    *angles = snap_into_range(params, angles);

    let spins = if angles.axis1 < range.minimum {
        ((range.minimum - angles.axis1) / 180.0).ceil()
    } else if angles.axis1 > range.maximum {
        -((angles.axis1 - range.maximum) / 180.0).ceil()
    } else {
        0.0
    };
    if spins != 0.0 {
        angles.axis1 += 180.0 * spins;
        if (spins as i64) % 2 != 0 {
            angles.axis2 = -angles.axis2;
        }
    }

    loop {
        let travel = angles.axis1 - initial.axis1;
        if travel.abs() <= 90.0 {
            break;
        }
        let candidate = flipped(angles, -180.0 * travel.signum());
        if validate(params, &candidate) && (candidate.axis1 - initial.axis1).abs() < travel.abs() {
            *angles = candidate;
        } else {
            break;
        }
    }

    let changed = *angles != original;
    if changed && !validate(params, angles) {
        log::debug!(
            "constrained angles ({:.3}, {:.3}) invalid, keeping ({:.3}, {:.3})",
            angles.axis1,
            angles.axis2,
            original.axis1,
            original.axis2
        );
        *angles = original;
        return Ok(false);
    }
    Ok(changed)
}

/// Manual flip: axis 1 moves 180° toward zero and axis 2 is negated.
pub fn flip(params: &HamParameters, angles: &AxisAngles) -> Result<AxisAngles, HelioError> {
    let shift = if angles.axis1 > 0.0 { -180.0 } else { 180.0 };
    let result = flipped(angles, shift);
    if validate(params, &result) {
        Ok(result)
    } else {
        Err(HelioError::InvalidFlip {
            axis1: result.axis1,
            axis2: result.axis2,
        })
    }
}
