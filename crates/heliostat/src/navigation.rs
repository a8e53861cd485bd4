//! From a pointing request to register commands.

use crate::config::HeliostatConfig;
use anyhow::Result;
use helio_core::{AxisAngles, RegisterValue, Vec3};
use helio_optim::{
    solve_constrained, solve_normal, solve_point_to_point, solve_vector_to_point, SolveResult,
};
use serde::{Deserialize, Serialize};

/// What the mirror should do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// Point the mirror normal along a world direction.
    Normal { normal: Vec3 },
    /// Reflect light from one world point onto another.
    PointToPoint { source: Vec3, target: Vec3 },
    /// Reflect light arriving along `incident` onto a world point.
    VectorToPoint { incident: Vec3, target: Vec3 },
}

/// Solved axis angles and the registers to send to the servos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigationCommand {
    pub angles: AxisAngles,
    pub registers: [RegisterValue; 2],
}

/// Solve `target` for the heliostat in `config`, starting from `current`.
///
/// Range enforcement follows [`solve_constrained`]. Registers are computed
/// even for a non-converged result so callers can inspect them; only a
/// converged command should be dispatched.
pub fn navigate(
    config: &HeliostatConfig,
    target: &Target,
    current: &AxisAngles,
) -> Result<SolveResult<NavigationCommand>> {
    let params = &config.parameters;
    let opts = &config.navigator;
    let result = solve_constrained(
        params,
        |start| match target {
            Target::Normal { normal } => solve_normal(params, normal, start, opts),
            Target::PointToPoint { source, target } => {
                solve_point_to_point(params, source, target, start, opts)
            }
            Target::VectorToPoint { incident, target } => {
                solve_vector_to_point(params, incident, target, start, opts)
            }
        },
        current,
        opts.throw_if_outside_constraints,
    )?;

    let [axis1, axis2] = config.servo_axes();
    let angles = result.solution;
    let registers = [
        axis1.goal_position(angles.axis1)?,
        axis2.goal_position(angles.axis2)?,
    ];
    log::debug!(
        "navigate: angles ({:.4}, {:.4}) -> registers {:?}",
        angles.axis1,
        angles.axis2,
        registers
    );
    Ok(result.map(|angles| NavigationCommand { angles, registers }))
}

/// Mirror normal for a point-to-point request, without solving.
pub fn desired_normal(pivot: &Vec3, source: &Vec3, target: &Vec3) -> Option<Vec3> {
    let a = (source - pivot).try_normalize(0.0)?;
    let b = (target - pivot).try_normalize(0.0)?;
    (a + b).try_normalize(1e-12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helio_core::{angle_to_position, mirror_center_and_normal, HamParameters};

    #[test]
    fn normal_target_produces_registers() {
        let config = HeliostatConfig::new(HamParameters::default());
        let truth = AxisAngles::new(20.0, -15.0);
        let (_, normal) = mirror_center_and_normal(&truth, &config.parameters);

        let result = navigate(&config, &Target::Normal { normal }, &AxisAngles::new(0.0, 0.0))
            .unwrap();
        assert!(result.converged, "{:?}", result.error_message);
        let command = result.solution;
        assert!((command.angles.axis1 - 20.0).abs() < 1e-3);
        assert!((command.angles.axis2 + 15.0).abs() < 1e-3);

        let expected = angle_to_position(20.0, &config.parameters.axis1.polynomial).round();
        assert_eq!(command.registers[0] as f64, expected);
    }

    #[test]
    fn desired_normal_is_bisector() {
        let n = desired_normal(
            &Vec3::zeros(),
            &Vec3::new(1.0, 1.0, 0.0),
            &Vec3::new(-1.0, 1.0, 0.0),
        )
        .unwrap();
        assert!((n - Vec3::y()).norm() < 1e-12);
        assert!(desired_normal(&Vec3::zeros(), &Vec3::x(), &-Vec3::x()).is_none());
    }

    #[test]
    fn target_json_is_tagged() {
        let json = r#"{ "kind": "point_to_point", "source": [0, 0, -1], "target": [0, 0, 1] }"#;
        let target: Target = serde_json::from_str(json).unwrap();
        assert_eq!(
            target,
            Target::PointToPoint {
                source: Vec3::new(0.0, 0.0, -1.0),
                target: Vec3::new(0.0, 0.0, 1.0),
            }
        );
    }
}
