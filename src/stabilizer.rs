//! IMU-driven pointing correction for the spotlight gimbal.
//!
//! A single proportional term: the measured tilt, scaled by
//! [`STABILIZATION_GAIN`], is subtracted from the commanded pitch/yaw.
//! There is no integral or derivative action, so sensor drift shows up as a
//! steady-state offset and oscillation is not damped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{CALIBRATION_SAMPLES, STABILIZATION_GAIN};
use crate::error::{Error, Result};
use crate::imu::{CalibrationOffset, Mpu6050, Orientation};
use crate::transport::RegisterBus;

/// Commanded pointing direction, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointingTarget {
    pub pitch: f64,
    pub yaw: f64,
}

impl PointingTarget {
    pub fn new(pitch: f64, yaw: f64) -> Self {
        Self { pitch, yaw }
    }
}

/// Counteract the measured tilt: pitch against pitch, yaw against roll.
pub fn stabilized_target(target: PointingTarget, orientation: Orientation) -> PointingTarget {
    let correction_pitch = -orientation.pitch * STABILIZATION_GAIN;
    let correction_yaw = -orientation.roll * STABILIZATION_GAIN;
    PointingTarget {
        pitch: target.pitch + correction_pitch,
        yaw: target.yaw + correction_yaw,
    }
}

/// Result of one correction: the tilt that was measured and where to point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub orientation: Orientation,
    pub target: PointingTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerState {
    Disabled,
    Armed,
}

/// The optional stabilization sensor of a gimbal.
pub enum Stabilizer<B: RegisterBus> {
    /// Stabilization was not requested
    Absent,
    /// Sensor fitted but initialize or calibrate failed
    Uncalibrated(Mpu6050<B>),
    /// Initialized and calibrated; corrections are applied
    Armed(Mpu6050<B>),
}

impl<B: RegisterBus> Stabilizer<B> {
    /// Initialize and calibrate `sensor`. Any failure leaves stabilization
    /// disabled for the session; there is no automatic retry.
    pub fn arm(sensor: Option<Mpu6050<B>>) -> Self {
        let Some(mut mpu) = sensor else {
            return Stabilizer::Absent;
        };

        match mpu
            .initialize()
            .and_then(|_| mpu.calibrate(CALIBRATION_SAMPLES))
        {
            Ok(_) => {
                log::info!("MPU6050 initialized and calibrated, stabilization armed");
                Stabilizer::Armed(mpu)
            }
            Err(e) => {
                log::warn!("Failed to prepare MPU6050 ({}), stabilization disabled", e);
                Stabilizer::Uncalibrated(mpu)
            }
        }
    }

    pub fn state(&self) -> StabilizerState {
        match self {
            Stabilizer::Armed(_) => StabilizerState::Armed,
            Stabilizer::Absent | Stabilizer::Uncalibrated(_) => StabilizerState::Disabled,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state() == StabilizerState::Armed
    }

    /// Current tilt. An initialized but uncalibrated sensor still answers,
    /// uncorrected.
    pub fn orientation(&mut self) -> Result<Orientation> {
        match self {
            Stabilizer::Absent => Err(Error::StabilizationDisabled),
            Stabilizer::Uncalibrated(mpu) | Stabilizer::Armed(mpu) => mpu.orientation(),
        }
    }

    /// Where to point so that `target` holds despite the measured tilt.
    pub fn correct(&mut self, target: PointingTarget) -> Result<Correction> {
        match self {
            Stabilizer::Armed(mpu) => {
                let orientation = mpu.orientation()?;
                let corrected = stabilized_target(target, orientation);
                log::debug!(
                    "Tilt {} -> pitch {:.2}°, yaw {:.2}°",
                    orientation,
                    corrected.pitch,
                    corrected.yaw
                );
                Ok(Correction {
                    orientation,
                    target: corrected,
                })
            }
            Stabilizer::Absent | Stabilizer::Uncalibrated(_) => Err(Error::StabilizationDisabled),
        }
    }

    /// Operator-requested calibration. Success arms stabilization; failure
    /// leaves the previous state and offsets untouched.
    pub fn recalibrate(&mut self, samples: usize) -> Result<CalibrationOffset> {
        let offset = match self {
            Stabilizer::Absent => return Err(Error::StabilizationDisabled),
            Stabilizer::Armed(mpu) => return mpu.calibrate(samples),
            Stabilizer::Uncalibrated(mpu) => {
                if !mpu.is_initialized() {
                    mpu.initialize()?;
                }
                mpu.calibrate(samples)?
            }
        };

        if let Stabilizer::Uncalibrated(mpu) = std::mem::replace(self, Stabilizer::Absent) {
            *self = Stabilizer::Armed(mpu);
            log::info!("Stabilization armed after recalibration");
        }
        Ok(offset)
    }

    /// Put the sensor to sleep, if there is one.
    pub fn close(&mut self) -> Result<()> {
        match self {
            Stabilizer::Absent => Ok(()),
            Stabilizer::Uncalibrated(mpu) | Stabilizer::Armed(mpu) => mpu.close(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStats {
    pub ticks: u64,
    pub failures: u64,
}

/// Call `tick` every `interval` until `running` goes false.
///
/// The flag is only checked between ticks. A failed tick is logged and
/// counted; the loop carries on with the next one.
pub fn run_loop<F>(interval: Duration, running: &AtomicBool, mut tick: F) -> LoopStats
where
    F: FnMut() -> Result<()>,
{
    let mut stats = LoopStats::default();

    while running.load(Ordering::Relaxed) {
        let started = Instant::now();
        stats.ticks += 1;
        if let Err(e) = tick() {
            stats.failures += 1;
            log::warn!("Stabilization tick {} failed: {}", stats.ticks, e);
        }

        if let Some(remaining) = interval.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }

    log::info!(
        "Stabilization loop stopped after {} ticks ({} failed)",
        stats.ticks,
        stats.failures
    );
    stats
}
