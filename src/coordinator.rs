//! Camera and spotlight gimbals under one roof.
//!
//! Either gimbal may be missing (not configured, or failed to come up).
//! That is a degraded but valid mode: commands aimed at a missing gimbal
//! fail, commands aimed at both are fanned out to whichever is present.

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crate::config::{CALIBRATION_SAMPLES, PwmBackend, SystemConfig};
use crate::error::{Actuator, Error, Result};
use crate::i2c::I2cBus;
use crate::imu::{CalibrationOffset, Mpu6050, Orientation};
use crate::pwm::{HardwarePulseOutput, SoftwarePulseOutput};
use crate::serial::SerialStream;
use crate::spotlight::{SpotlightGimbal, SpotlightStatus};
use crate::stabilizer::{LoopStats, PointingTarget, StabilizerState, run_loop};
use crate::storm32::{CameraAngles, Storm32Gimbal};
use crate::transport::{ByteStream, PulseOutput, RegisterBus};

/// What happened to one gimbal during a fan-out command.
#[derive(Debug)]
pub enum Outcome {
    Applied,
    Failed(Error),
    Absent,
}

#[derive(Debug)]
pub struct ActuatorResult {
    pub actuator: Actuator,
    pub outcome: Outcome,
}

impl ActuatorResult {
    /// Classify the result of a single-gimbal call. `ActuatorAbsent`
    /// counts as absent rather than failed.
    pub fn new(actuator: Actuator, result: Result<()>) -> Self {
        match result {
            Err(Error::ActuatorAbsent(_)) => Self::from_optional(actuator, None),
            other => Self::from_optional(actuator, Some(other)),
        }
    }

    fn from_optional(actuator: Actuator, result: Option<Result<()>>) -> Self {
        let outcome = match result {
            None => Outcome::Absent,
            Some(Ok(())) => Outcome::Applied,
            Some(Err(e)) => {
                log::warn!("{} rejected command: {}", actuator, e);
                Outcome::Failed(e)
            }
        };
        Self { actuator, outcome }
    }

    pub fn applied(&self) -> bool {
        matches!(self.outcome, Outcome::Applied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraReport {
    pub commanded: CameraAngles,
    /// Whether the controller answered a status request
    pub responding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemStatus {
    pub camera: Option<CameraReport>,
    pub spotlight: Option<SpotlightStatus>,
}

pub struct DualGimbal<S: ByteStream, P: PulseOutput, B: RegisterBus> {
    camera: Option<Storm32Gimbal<S>>,
    spotlight: Option<SpotlightGimbal<P, B>>,
}

/// The coordinator wired to Raspberry Pi peripherals.
pub type HardwareGimbals = DualGimbal<SerialStream, Box<dyn PulseOutput>, I2cBus>;

impl<S: ByteStream, P: PulseOutput, B: RegisterBus> DualGimbal<S, P, B> {
    pub fn new(
        camera: Option<Storm32Gimbal<S>>,
        spotlight: Option<SpotlightGimbal<P, B>>,
    ) -> Self {
        if camera.is_none() {
            log::warn!("Camera gimbal not available, continuing without it");
        }
        if spotlight.is_none() {
            log::warn!("Spotlight gimbal not available, continuing without it");
        }
        Self { camera, spotlight }
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    pub fn has_spotlight(&self) -> bool {
        self.spotlight.is_some()
    }

    pub fn set_camera_position(&mut self, pitch: f64, roll: f64, yaw: f64) -> Result<()> {
        self.camera_mut()?.set_angle(pitch, roll, yaw)
    }

    pub fn set_spotlight_position(&mut self, pitch: f64, yaw: f64) -> Result<()> {
        self.spotlight_mut()?.set_position(pitch, yaw)
    }

    /// °/s per axis
    pub fn set_camera_speed(&mut self, pitch: f64, roll: f64, yaw: f64) -> Result<()> {
        self.camera_mut()?.set_speed(pitch, roll, yaw)
    }

    /// Percent per axis
    pub fn set_spotlight_speed(&mut self, pitch: f64, yaw: f64) -> Result<()> {
        self.spotlight_mut()?.set_speed(pitch, yaw)
    }

    /// Point both gimbals the same way (camera roll 0). Best effort: each
    /// gimbal reports its own outcome.
    pub fn sync_both(&mut self, pitch: f64, yaw: f64) -> Vec<ActuatorResult> {
        log::debug!("Syncing gimbals - Pitch: {}, Yaw: {}", pitch, yaw);
        vec![
            ActuatorResult::from_optional(
                Actuator::Camera,
                self.camera
                    .as_mut()
                    .map(|camera| camera.set_angle(pitch, 0.0, yaw)),
            ),
            ActuatorResult::from_optional(
                Actuator::Spotlight,
                self.spotlight
                    .as_mut()
                    .map(|spotlight| spotlight.set_position(pitch, yaw)),
            ),
        ]
    }

    pub fn center_all(&mut self) -> Vec<ActuatorResult> {
        vec![
            ActuatorResult::from_optional(
                Actuator::Camera,
                self.camera.as_mut().map(|camera| camera.center()),
            ),
            ActuatorResult::from_optional(
                Actuator::Spotlight,
                self.spotlight.as_mut().map(|spotlight| spotlight.center()),
            ),
        ]
    }

    pub fn orientation(&mut self) -> Result<Orientation> {
        self.spotlight_mut()?.orientation()
    }

    pub fn calibrate(&mut self) -> Result<CalibrationOffset> {
        self.spotlight_mut()?.calibrate(CALIBRATION_SAMPLES)
    }

    /// One stabilization tick for the spotlight.
    pub fn stabilize(&mut self) -> Result<PointingTarget> {
        self.spotlight_mut()?.stabilize()
    }

    /// Stabilize the spotlight every `interval` until `running` clears.
    ///
    /// Refuses to start when stabilization is not armed.
    pub fn run_stabilization(
        &mut self,
        interval: Duration,
        running: &AtomicBool,
    ) -> Result<LoopStats> {
        let spotlight = self.spotlight_mut()?;
        if spotlight.stabilization() != StabilizerState::Armed {
            return Err(Error::StabilizationDisabled);
        }
        log::info!(
            "Stabilization loop running at {:.1}Hz",
            1.0 / interval.as_secs_f64()
        );
        Ok(run_loop(interval, running, || {
            spotlight.stabilize().map(|_| ())
        }))
    }

    /// Snapshot of both gimbals. Queries the camera controller.
    pub fn status(&mut self) -> SystemStatus {
        let camera = self.camera.as_mut().map(|camera| CameraReport {
            responding: camera.status().is_ok(),
            commanded: camera.commanded(),
        });
        SystemStatus {
            camera,
            spotlight: self.spotlight.as_ref().map(|spotlight| spotlight.status()),
        }
    }

    /// Release both gimbals. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut spotlight) = self.spotlight.take()
            && let Err(e) = spotlight.close()
        {
            log::error!("Error during spotlight shutdown: {}", e);
        }
        if let Some(mut camera) = self.camera.take() {
            camera.disconnect();
        }
        log::info!("Gimbal system shut down");
    }

    fn camera_mut(&mut self) -> Result<&mut Storm32Gimbal<S>> {
        self.camera
            .as_mut()
            .ok_or(Error::ActuatorAbsent(Actuator::Camera))
    }

    fn spotlight_mut(&mut self) -> Result<&mut SpotlightGimbal<P, B>> {
        self.spotlight
            .as_mut()
            .ok_or(Error::ActuatorAbsent(Actuator::Spotlight))
    }
}

impl HardwareGimbals {
    /// Bring up every enabled gimbal independently. A gimbal that fails to
    /// open is logged and left out.
    pub fn open(config: &SystemConfig) -> Self {
        let camera = if config.camera_gimbal.enabled {
            open_camera(config)
                .inspect_err(|e| log::error!("Failed to connect to Storm32: {}", e))
                .ok()
        } else {
            None
        };

        let spotlight = if config.spotlight_gimbal.enabled {
            open_spotlight(config)
                .inspect_err(|e| log::error!("Failed to initialize spotlight gimbal: {}", e))
                .ok()
        } else {
            None
        };

        Self::new(camera, spotlight)
    }
}

fn open_camera(config: &SystemConfig) -> Result<Storm32Gimbal<SerialStream>> {
    let camera = &config.camera_gimbal;
    let stream = SerialStream::open(&camera.serial_port, camera.baudrate, camera.timeout()?)?;
    Ok(Storm32Gimbal::new(stream))
}

fn open_spotlight(
    config: &SystemConfig,
) -> Result<SpotlightGimbal<Box<dyn PulseOutput>, I2cBus>> {
    let spotlight = &config.spotlight_gimbal;
    let output: Box<dyn PulseOutput> = match spotlight.pwm_backend {
        PwmBackend::Software => Box::new(SoftwarePulseOutput::new()?),
        PwmBackend::Hardware => Box::new(HardwarePulseOutput::with_pins(&[
            spotlight.pitch_pin,
            spotlight.yaw_pin,
        ])?),
    };

    let sensor = if spotlight.use_stabilization {
        match I2cBus::open(spotlight.i2c_bus) {
            Ok(bus) => Some(Mpu6050::with_address(bus, spotlight.i2c_address)),
            Err(e) => {
                log::warn!("{}, stabilization disabled", e);
                None
            }
        }
    } else {
        None
    };

    SpotlightGimbal::initialize(output, spotlight.pitch_pin, spotlight.yaw_pin, sensor)
}
