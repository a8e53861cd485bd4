//! Per-heliostat configuration: the model plus every solver option.

use helio_core::{HamParameters, Real};
use helio_optim::{BackendSolveOptions, CalibrationOptions, NavigatorOptions, ServoAxis};
use serde::{Deserialize, Serialize};

/// Everything needed to calibrate and drive one heliostat.
///
/// Missing fields deserialize to their defaults, so a configuration file only
/// has to name what differs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeliostatConfig {
    pub parameters: HamParameters,
    /// Servo zero minus model zero for axis 1, degrees.
    pub axis1_angle_offset: Real,
    /// Servo zero minus model zero for axis 2, degrees.
    pub axis2_angle_offset: Real,
    pub calibration: CalibrationOptions,
    pub navigator: NavigatorOptions,
    pub backend: BackendSolveOptions,
}

impl HeliostatConfig {
    pub fn new(parameters: HamParameters) -> Self {
        Self {
            parameters,
            ..Self::default()
        }
    }

    /// Servo views of both axes.
    pub fn servo_axes(&self) -> [ServoAxis; 2] {
        [
            ServoAxis::from_axis(&self.parameters.axis1, self.axis1_angle_offset),
            ServoAxis::from_axis(&self.parameters.axis2, self.axis2_angle_offset),
        ]
    }
}
