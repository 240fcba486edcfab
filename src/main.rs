use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use airborne_gimbal::coordinator::{ActuatorResult, Outcome, SystemStatus};
use airborne_gimbal::error::Actuator;
use airborne_gimbal::{HardwareGimbals, SystemConfig};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;

// Usage:
//  gimbal position --pitch 30 --yaw -45            → both gimbals to the same angles
//  gimbal position --pitch 10 --yaw 0 --roll 5 --target camera
//  gimbal speed --pitch 20 --yaw 0 --target spotlight  → spotlight at 20% up
//  gimbal stabilize --interval 0.05                → hold the spotlight until Ctrl-C
#[derive(Parser, Debug)]
#[command(name = "gimbal", version, about = "Dual gimbal controller", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Point a gimbal at absolute angles (degrees)
    Position(AxisArgs),
    /// Rotate a gimbal (camera °/s, spotlight percent)
    Speed(AxisArgs),
    /// Return both gimbals to center
    Center,
    /// Print the spotlight IMU tilt
    Orientation,
    /// Recalibrate the spotlight IMU (keep it level)
    Calibrate,
    /// Stabilize the spotlight until Ctrl-C
    Stabilize {
        /// Loop interval in seconds (defaults to the config value)
        #[arg(short, long)]
        interval: Option<f64>,
    },
    /// Print the state of both gimbals
    Status,
}

#[derive(clap::Args, Debug)]
struct AxisArgs {
    #[arg(long, allow_negative_numbers = true)]
    pitch: f64,

    #[arg(long, allow_negative_numbers = true)]
    yaw: f64,

    /// Camera only
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    roll: f64,

    #[arg(long, value_enum, default_value_t = Target::Both)]
    target: Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Target {
    Camera,
    Spotlight,
    Both,
}

impl Target {
    fn includes(self, actuator: Actuator) -> bool {
        match self {
            Target::Both => true,
            Target::Camera => actuator == Actuator::Camera,
            Target::Spotlight => actuator == Actuator::Spotlight,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = SystemConfig::load(&args.config)?;
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_filter())).init();

    let mut gimbals = HardwareGimbals::open(&config);

    let result = run(&mut gimbals, &config, args.command);
    gimbals.shutdown();
    result
}

fn run(
    gimbals: &mut HardwareGimbals,
    config: &SystemConfig,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Position(axes) => {
            let results = if axes.target == Target::Both && axes.roll == 0.0 {
                gimbals.sync_both(axes.pitch, axes.yaw)
            } else {
                apply(
                    gimbals,
                    axes.target,
                    |g| g.set_camera_position(axes.pitch, axes.roll, axes.yaw),
                    |g| g.set_spotlight_position(axes.pitch, axes.yaw),
                )
            };
            println!("Position - Pitch: {}°, Yaw: {}°", axes.pitch, axes.yaw);
            report(&results)
        }
        Command::Speed(axes) => {
            let results = apply(
                gimbals,
                axes.target,
                |g| g.set_camera_speed(axes.pitch, axes.roll, axes.yaw),
                |g| g.set_spotlight_speed(axes.pitch, axes.yaw),
            );
            println!("Speed - Pitch: {}, Yaw: {}", axes.pitch, axes.yaw);
            report(&results)
        }
        Command::Center => {
            println!("Centering gimbals...");
            report(&gimbals.center_all())
        }
        Command::Orientation => {
            let orientation = gimbals.orientation()?;
            println!(
                "Orientation - Pitch: {:.2}°, Roll: {:.2}°",
                orientation.pitch, orientation.roll
            );
            Ok(())
        }
        Command::Calibrate => {
            println!("Calibrating IMU, keep the platform level and still...");
            let offset = gimbals.calibrate()?;
            println!("✓ Calibration complete");
            println!("  Accel offset: {} g", offset.acceleration);
            println!("  Gyro offset:  {} °/s", offset.angular_rate);
            Ok(())
        }
        Command::Stabilize { interval } => {
            let mut stabilization = config.stabilization.clone();
            if let Some(secs) = interval {
                stabilization.interval_secs = secs;
            }
            let interval = stabilization.interval()?;

            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                r.store(false, Ordering::SeqCst);
            })?;

            println!("Stabilizing spotlight every {:?} (Ctrl-C to stop)", interval);
            let stats = gimbals.run_stabilization(interval, &running)?;
            println!(
                "\nStopped after {} updates ({} failed)",
                stats.ticks, stats.failures
            );
            Ok(())
        }
        Command::Status => {
            print_status(&gimbals.status());
            Ok(())
        }
    }
}

/// Run the camera and/or spotlight half of a command, per `target`.
fn apply<C, S>(
    gimbals: &mut HardwareGimbals,
    target: Target,
    camera: C,
    spotlight: S,
) -> Vec<ActuatorResult>
where
    C: FnOnce(&mut HardwareGimbals) -> airborne_gimbal::Result<()>,
    S: FnOnce(&mut HardwareGimbals) -> airborne_gimbal::Result<()>,
{
    let mut results = Vec::with_capacity(2);
    if target.includes(Actuator::Camera) {
        results.push(ActuatorResult::new(Actuator::Camera, camera(gimbals)));
    }
    if target.includes(Actuator::Spotlight) {
        results.push(ActuatorResult::new(Actuator::Spotlight, spotlight(gimbals)));
    }
    results
}

fn report(results: &[ActuatorResult]) -> Result<(), Box<dyn std::error::Error>> {
    let mut failed = false;
    for result in results {
        match &result.outcome {
            Outcome::Applied => println!("  ✓ {}", result.actuator),
            Outcome::Absent => println!("  - {}: not available", result.actuator),
            Outcome::Failed(e) => {
                failed = true;
                println!("  ✗ {}: {}", result.actuator, e);
            }
        }
    }

    if failed || !results.iter().any(ActuatorResult::applied) {
        return Err("command was not applied".into());
    }
    Ok(())
}

fn print_status(status: &SystemStatus) {
    println!("\n[Gimbal Status]");
    match &status.camera {
        Some(camera) => {
            println!(
                "  Camera:    Pitch {:.1}°, Roll {:.1}°, Yaw {:.1}°",
                camera.commanded.pitch, camera.commanded.roll, camera.commanded.yaw
            );
            println!(
                "             Controller {}",
                if camera.responding {
                    "responding"
                } else {
                    "not responding"
                }
            );
        }
        None => println!("  Camera:    N/A"),
    }

    match &status.spotlight {
        Some(spotlight) => {
            println!(
                "  Spotlight: Pitch {:.1}°, Yaw {:.1}° ({})",
                spotlight.target.pitch, spotlight.target.yaw, spotlight.last_signal
            );
            println!("             Stabilization {:?}", spotlight.stabilization);
            if let Some(orientation) = spotlight.last_orientation {
                println!("             Last tilt {}", orientation);
            }
        }
        None => println!("  Spotlight: N/A"),
    }
    println!();
}
