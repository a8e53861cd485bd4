use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use heliostat::optim::{
    mirror_plane, residual_report, rotation_frame, PlaneSolveOptions, ResidualReport,
    ServoSolveOptions,
};
use heliostat::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Heliostat calibration and navigation driven by JSON files.
#[derive(Debug, Parser)]
#[command(author, version, about = "Heliostat action model tools")]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fit the model to observations and print the calibrated parameters.
    Calibrate {
        /// Path to a JSON HeliostatConfig; defaults are used if omitted.
        #[arg(long)]
        config: Option<String>,
        /// Path to a JSON array of CalibrationObservation.
        #[arg(long)]
        observations: String,
        /// Write the updated HeliostatConfig here when calibration converges.
        #[arg(long)]
        output: Option<String>,
    },
    /// Solve axis angles and register commands for a target.
    Navigate {
        #[arg(long)]
        config: Option<String>,
        /// Path to a JSON Target.
        #[arg(long)]
        target: String,
        /// Current axis 1 angle, degrees.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        axis1: f64,
        /// Current axis 2 angle, degrees.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        axis2: f64,
    },
    /// Convert between an axis angle and a servo register.
    Servo {
        #[arg(long)]
        config: Option<String>,
        /// Axis number, 1 or 2.
        #[arg(long, default_value_t = 1)]
        axis: u8,
        /// Angle in degrees to convert to a register value.
        #[arg(long, allow_negative_numbers = true, conflicts_with = "register")]
        angle: Option<f64>,
        /// Register value to convert to an angle.
        #[arg(long)]
        register: Option<RegisterValue>,
    },
    /// Fit a mirror plane to camera rays and observed world points.
    Plane {
        /// Path to a JSON PlaneInput.
        #[arg(long)]
        input: String,
    },
    /// Fit the rotation aligning `pre` directions with `post` directions.
    Rotation {
        /// Path to a JSON RotationInput.
        #[arg(long)]
        input: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlaneInput {
    camera_rays: Vec<Ray>,
    world_points: Vec<Vec3>,
    #[serde(default)]
    options: PlaneSolveOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RotationInput {
    pre: Vec<Vec3>,
    post: Vec<Vec3>,
    #[serde(default)]
    options: BackendSolveOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalibrationReport {
    result: SolveResult<HamParameters>,
    before: ResidualReport,
    after: ResidualReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ServoReport {
    Register(RegisterValue),
    Angle(SolveResult<f64>),
}

fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn load_config(path: Option<&str>) -> Result<HeliostatConfig> {
    match path {
        Some(path) => load_json_file(Path::new(path)),
        None => Ok(HeliostatConfig::default()),
    }
}

fn calibrate_from_files(
    config_path: Option<&str>,
    observations_path: &str,
    output_path: Option<&str>,
) -> Result<String> {
    let mut config = load_config(config_path)?;
    let observations: Vec<CalibrationObservation> =
        load_json_file(Path::new(observations_path))?;
    let diameter = config.calibration.mirror_diameter;

    let mut fleet = Fleet::new();
    fleet.insert("cli", config.clone());
    let before = residual_report(&observations, &config.parameters, diameter);
    let result = fleet.calibrate("cli", &observations)?;
    let after = residual_report(&observations, &result.solution, diameter);
    log::info!("rms residual {:.6e} -> {:.6e}", before.rms, after.rms);

    if let Some(output) = output_path {
        if result.converged {
            config.parameters = result.solution.clone();
            fs::write(output, serde_json::to_string_pretty(&config)?)
                .with_context(|| format!("writing {}", output))?;
        } else {
            log::warn!("calibration did not converge, {} not written", output);
        }
    }

    let report = CalibrationReport {
        result,
        before,
        after,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn navigate_from_files(config_path: Option<&str>, target_path: &str, current: AxisAngles) -> Result<String> {
    let config = load_config(config_path)?;
    let target: Target = load_json_file(Path::new(target_path))?;
    let result = heliostat::navigate(&config, &target, &current)?;
    Ok(serde_json::to_string_pretty(&result)?)
}

fn servo_from_files(
    config_path: Option<&str>,
    axis: u8,
    angle: Option<f64>,
    register: Option<RegisterValue>,
) -> Result<String> {
    let config = load_config(config_path)?;
    let [axis1, axis2] = config.servo_axes();
    let servo = match axis {
        1 => axis1,
        2 => axis2,
        other => bail!("axis must be 1 or 2, got {}", other),
    };
    let report = match (angle, register) {
        (Some(angle), None) => ServoReport::Register(servo.goal_position(angle)?),
        (None, Some(register)) => {
            ServoReport::Angle(servo.angle_from_register(register, &ServoSolveOptions::default())?)
        }
        _ => bail!("exactly one of --angle or --register is required"),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn plane_from_file(input_path: &str) -> Result<String> {
    let input: PlaneInput = load_json_file(Path::new(input_path))?;
    let result = mirror_plane::solve(&input.camera_rays, &input.world_points, &input.options)?;
    Ok(serde_json::to_string_pretty(&result)?)
}

fn rotation_from_file(input_path: &str) -> Result<String> {
    let input: RotationInput = load_json_file(Path::new(input_path))?;
    let result = rotation_frame::solve(&input.pre, &input.post, &input.options)?;
    Ok(serde_json::to_string_pretty(&result)?)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let json = match args.command {
        Command::Calibrate {
            config,
            observations,
            output,
        } => calibrate_from_files(config.as_deref(), &observations, output.as_deref())?,
        Command::Navigate {
            config,
            target,
            axis1,
            axis2,
        } => navigate_from_files(config.as_deref(), &target, AxisAngles::new(axis1, axis2))?,
        Command::Servo {
            config,
            axis,
            angle,
            register,
        } => servo_from_files(config.as_deref(), axis, angle, register)?,
        Command::Plane { input } => plane_from_file(&input)?,
        Command::Rotation { input } => rotation_from_file(&input)?,
    };
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use heliostat::core::{mirror_center_and_normal, Plane, Quat};
    use heliostat::synthetic::{angle_grid, observations, reference_parameters};
    use tempfile::NamedTempFile;

    fn write_json<T: Serialize>(value: &T, path: &Path) {
        serde_json::to_writer_pretty(fs::File::create(path).unwrap(), value).unwrap();
    }

    fn path_of(file: &NamedTempFile) -> &str {
        file.path().to_str().unwrap()
    }

    #[test]
    fn calibrate_writes_updated_config() {
        let truth = reference_parameters();
        let poses = angle_grid(&[-20.0, 0.0, 20.0], &[-15.0, 10.0, 30.0]);
        let batch = observations(&truth, &Vec3::new(0.3, -2.5, 1.0), &poses, 3.0);

        let mut prior = truth.clone();
        prior.position += Vec3::new(0.02, 0.03, -0.01);
        let config_file = NamedTempFile::new().unwrap();
        let obs_file = NamedTempFile::new().unwrap();
        let out_file = NamedTempFile::new().unwrap();
        write_json(&HeliostatConfig::new(prior), config_file.path());
        write_json(&batch, obs_file.path());

        let json = calibrate_from_files(
            Some(path_of(&config_file)),
            path_of(&obs_file),
            Some(path_of(&out_file)),
        )
        .expect("calibration helper should succeed");

        let report: CalibrationReport = serde_json::from_str(&json).unwrap();
        assert!(report.result.converged, "{:?}", report.result.error_message);
        assert!(report.after.rms < report.before.rms);

        let written: HeliostatConfig = load_json_file(out_file.path()).unwrap();
        assert!((written.parameters.position - truth.position).norm() < 1e-5);
    }

    #[test]
    fn navigate_reads_tagged_target() {
        let config = HeliostatConfig::default();
        let (_, normal) = mirror_center_and_normal(&AxisAngles::new(-30.0, 20.0), &config.parameters);
        let config_file = NamedTempFile::new().unwrap();
        let target_file = NamedTempFile::new().unwrap();
        write_json(&config, config_file.path());
        write_json(&Target::Normal { normal }, target_file.path());

        let json = navigate_from_files(
            Some(path_of(&config_file)),
            path_of(&target_file),
            AxisAngles::new(-25.0, 15.0),
        )
        .unwrap();
        let result: SolveResult<NavigationCommand> = serde_json::from_str(&json).unwrap();
        assert!(result.converged, "{:?}", result.error_message);
        assert!((result.solution.angles.axis1 + 30.0).abs() < 1e-3);
        assert!((result.solution.angles.axis2 - 20.0).abs() < 1e-3);
    }

    #[test]
    fn servo_converts_both_ways() {
        let json = servo_from_files(None, 2, Some(0.0), None).unwrap();
        let report: ServoReport = serde_json::from_str(&json).unwrap();
        assert!(matches!(report, ServoReport::Register(2048)));

        let json = servo_from_files(None, 1, None, Some(2048 + 1024)).unwrap();
        match serde_json::from_str::<ServoReport>(&json).unwrap() {
            ServoReport::Angle(result) => {
                assert!(result.converged);
                assert!((result.solution - 90.0).abs() < 1e-6);
            }
            other => panic!("unexpected report {other:?}"),
        }

        assert!(servo_from_files(None, 3, Some(0.0), None).is_err());
        assert!(servo_from_files(None, 1, None, None).is_err());
    }

    #[test]
    fn plane_and_rotation_fits_from_files() {
        let truth = Plane::new(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 0.1, -1.0));
        let camera = Vec3::zeros();
        let hits = [
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(0.3, 0.1, 2.0),
            Vec3::new(-0.2, 0.3, 2.0),
            Vec3::new(0.1, -0.3, 2.0),
        ];
        let mut camera_rays = Vec::new();
        let mut world_points = Vec::new();
        for (i, hit) in hits.iter().enumerate() {
            let ray = Ray::new(camera, truth.intersect(&Ray::new(camera, *hit)) - camera);
            world_points.push(truth.reflect(&ray).point_at(0.6 + 0.3 * i as f64));
            camera_rays.push(ray);
        }
        let plane_file = NamedTempFile::new().unwrap();
        write_json(
            &PlaneInput {
                camera_rays,
                world_points,
                options: PlaneSolveOptions::default(),
            },
            plane_file.path(),
        );
        let result: SolveResult<Plane> =
            serde_json::from_str(&plane_from_file(path_of(&plane_file)).unwrap()).unwrap();
        assert!(result.converged);
        assert!((result.solution.normal - truth.normal).norm() < 1e-6);

        let rotation = Quat::from_scaled_axis(Vec3::new(0.0, 0.4, 0.1));
        let pre = vec![Vec3::x(), Vec3::y(), Vec3::new(0.0, 1.0, 1.0)];
        let post = pre.iter().map(|v| rotation * v).collect();
        let rotation_file = NamedTempFile::new().unwrap();
        write_json(
            &RotationInput {
                pre,
                post,
                options: BackendSolveOptions::default(),
            },
            rotation_file.path(),
        );
        let json = rotation_from_file(path_of(&rotation_file)).unwrap();
        let result: SolveResult<heliostat::optim::RotationFrame> = serde_json::from_str(&json).unwrap();
        assert!(result.converged);
        assert!(result.solution.rotation.angle_to(&rotation) < 1e-6);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = plane_from_file("/nonexistent/plane.json").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/plane.json"));
    }
}
