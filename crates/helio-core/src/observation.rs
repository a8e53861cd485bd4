use crate::error::HelioError;
use crate::geometry::Ray;
use crate::math::{Real, Vec3};
use crate::params::AxisAngles;
use crate::servo::invert_polynomial;
use nalgebra::{convert, RealField, Vector3};
use serde::{Deserialize, Serialize};

/// One calibration sample: a camera ray that hits the mirror, the world point
/// the reflected light was seen at, and the servo readings at that moment.
///
/// Servo positions are register units. They are stored as `Real` so averaged
/// readings keep their fractional part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationObservation {
    pub camera_ray: Ray,
    pub world_point: Vec3,
    pub axis1_servo_position: Real,
    pub axis2_servo_position: Real,
    /// Degrees added to the angle recovered from the axis 1 servo position.
    #[serde(default)]
    pub axis1_angle_offset: Real,
    /// Degrees added to the angle recovered from the axis 2 servo position.
    #[serde(default)]
    pub axis2_angle_offset: Real,
}

impl CalibrationObservation {
    /// Build a batch from parallel columns.
    ///
    /// Every column must have the same length as `camera_rays`.
    pub fn from_columns(
        camera_rays: &[Ray],
        world_points: &[Vec3],
        axis1_servo_positions: &[Real],
        axis2_servo_positions: &[Real],
        axis1_angle_offsets: &[Real],
        axis2_angle_offsets: &[Real],
    ) -> Result<Vec<Self>, HelioError> {
        let n = camera_rays.len();
        for (what, len) in [
            ("world points", world_points.len()),
            ("axis 1 servo positions", axis1_servo_positions.len()),
            ("axis 2 servo positions", axis2_servo_positions.len()),
            ("axis 1 angle offsets", axis1_angle_offsets.len()),
            ("axis 2 angle offsets", axis2_angle_offsets.len()),
        ] {
            if len != n {
                return Err(HelioError::LengthMismatch {
                    what,
                    expected: n,
                    got: len,
                });
            }
        }

        Ok((0..n)
            .map(|i| Self {
                camera_ray: camera_rays[i].clone(),
                world_point: world_points[i],
                axis1_servo_position: axis1_servo_positions[i],
                axis2_servo_position: axis2_servo_positions[i],
                axis1_angle_offset: axis1_angle_offsets[i],
                axis2_angle_offset: axis2_angle_offsets[i],
            })
            .collect())
    }

    /// Axis angles implied by the servo readings under the given polynomials.
    pub fn axis_angles<T: RealField>(
        &self,
        axis1_polynomial: &Vector3<T>,
        axis2_polynomial: &Vector3<T>,
    ) -> AxisAngles<T> {
        let axis1 = invert_polynomial(convert(self.axis1_servo_position), axis1_polynomial)
            + convert::<f64, T>(self.axis1_angle_offset);
        let axis2 = invert_polynomial(convert(self.axis2_servo_position), axis2_polynomial)
            + convert::<f64, T>(self.axis2_angle_offset);
        AxisAngles { axis1, axis2 }
    }
}
