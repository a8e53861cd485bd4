//! Heliostat parameter types.
//!
//! [`HamParameters`] is generic over the scalar so the solvers can evaluate the
//! model with dual numbers; stored and serialized parameters use [`Real`].
//! Angle ranges are always plain `f64`: they constrain navigation results but
//! never enter a cost function.

use crate::error::HelioError;
use crate::math::{lift3, Real, Vec3};
use crate::servo::default_polynomial;
use nalgebra::{convert, RealField, Scalar, Vector3};
use serde::{Deserialize, Serialize};

/// Mechanical angles of the two axes, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisAngles<T = Real> {
    pub axis1: T,
    pub axis2: T,
}

impl<T> AxisAngles<T> {
    pub fn new(axis1: T, axis2: T) -> Self {
        Self { axis1, axis2 }
    }
}

impl AxisAngles<Real> {
    /// Convert into another scalar type.
    pub fn cast<T: RealField>(&self) -> AxisAngles<T> {
        AxisAngles {
            axis1: convert(self.axis1),
            axis2: convert(self.axis2),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.axis1.is_finite() && self.axis2.is_finite()
    }
}

/// Inclusive angle interval in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub minimum: Real,
    pub maximum: Real,
}

impl AngleRange {
    pub fn new(minimum: Real, maximum: Real) -> Self {
        Self { minimum, maximum }
    }

    pub fn contains(&self, angle: Real) -> bool {
        angle >= self.minimum && angle <= self.maximum
    }

    pub fn span(&self) -> Real {
        self.maximum - self.minimum
    }

    pub fn center(&self) -> Real {
        0.5 * (self.minimum + self.maximum)
    }

    pub fn clamp(&self, angle: Real) -> Real {
        angle.max(self.minimum).min(self.maximum)
    }
}

impl Default for AngleRange {
    fn default() -> Self {
        Self::new(-180.0, 180.0)
    }
}

/// Per-axis parameters.
///
/// `polynomial` maps the axis angle (degrees) to a servo register position:
/// `position = c0 + c1·θ + c2·θ²`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisParameters<T: Scalar = Real> {
    pub polynomial: Vector3<T>,
    pub rotation_axis: Vector3<T>,
    pub angle_range: AngleRange,
}

impl AxisParameters<Real> {
    pub fn new(rotation_axis: Vec3, angle_range: AngleRange) -> Self {
        Self {
            polynomial: default_polynomial(),
            rotation_axis,
            angle_range,
        }
    }

    pub fn cast<T: RealField>(&self) -> AxisParameters<T> {
        AxisParameters {
            polynomial: lift3(&self.polynomial),
            rotation_axis: lift3(&self.rotation_axis),
            angle_range: self.angle_range,
        }
    }
}

/// Full kinematic parameter set of one heliostat.
///
/// Mutated only by replacing the whole value (a calibration result or a manual
/// edit); navigation reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HamParameters<T: Scalar = Real> {
    /// Pivot location in world coordinates.
    pub position: Vector3<T>,
    /// Yaw of the whole mount about world +Y, degrees.
    pub rotation_y: T,
    pub axis1: AxisParameters<T>,
    pub axis2: AxisParameters<T>,
    /// Distance from the pivot to the mirror surface along the local down axis.
    pub mirror_offset: T,
}

impl Default for HamParameters<Real> {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation_y: 0.0,
            axis1: AxisParameters::new(Vec3::new(0.0, -1.0, 0.0), AngleRange::new(-180.0, 180.0)),
            axis2: AxisParameters::new(Vec3::new(1.0, 0.0, 0.0), AngleRange::new(-90.0, 90.0)),
            mirror_offset: 0.136,
        }
    }
}

impl HamParameters<Real> {
    /// Convert into another scalar type (e.g. dual numbers inside a residual).
    pub fn cast<T: RealField>(&self) -> HamParameters<T> {
        HamParameters {
            position: lift3(&self.position),
            rotation_y: convert(self.rotation_y),
            axis1: self.axis1.cast(),
            axis2: self.axis2.cast(),
            mirror_offset: convert(self.mirror_offset),
        }
    }

    /// Check the invariants the navigator relies on.
    ///
    /// Axis 1 must span at least 180° so that every mirror orientation has an
    /// in-range representative under the axis flip. Axis 2 may be narrower.
    pub fn validate_ranges(&self) -> Result<(), HelioError> {
        for (axis, range) in [(1u8, &self.axis1.angle_range), (2, &self.axis2.angle_range)] {
            if !range.minimum.is_finite() || !range.maximum.is_finite() {
                return Err(HelioError::NonFinite("axis angle range"));
            }
            if axis == 1 && range.span() < 180.0 {
                return Err(HelioError::AxisRangeTooNarrow {
                    axis,
                    minimum: range.minimum,
                    maximum: range.maximum,
                });
            }
        }
        Ok(())
    }

    /// Both angles inside their configured ranges.
    pub fn contains(&self, angles: &AxisAngles) -> bool {
        self.axis1.angle_range.contains(angles.axis1) && self.axis2.angle_range.contains(angles.axis2)
    }
}
