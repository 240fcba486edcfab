use crate::config::{PITCH_RANGE, SERVO_CENTER_PULSE_US, YAW_RANGE};
use crate::error::Result;
use crate::imu::{CalibrationOffset, Mpu6050, Orientation};
use crate::mapper::{DriveSignal, angle_to_pulse, clamp_logged, ensure_finite, speed_to_pulse};
use crate::stabilizer::{PointingTarget, Stabilizer, StabilizerState};
use crate::transport::{PulseOutput, RegisterBus};

/// Snapshot reported by [`SpotlightGimbal::status`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotlightStatus {
    pub target: PointingTarget,
    pub last_signal: DriveSignal,
    pub stabilization: StabilizerState,
    pub last_orientation: Option<Orientation>,
}

/// 2-axis spotlight mount on two 360° continuous-rotation servos, with an
/// optional MPU6050 for stabilization.
pub struct SpotlightGimbal<P: PulseOutput, B: RegisterBus> {
    output: P,
    pitch_pin: u8,
    yaw_pin: u8,
    target: PointingTarget,
    last_signal: DriveSignal,
    last_orientation: Option<Orientation>,
    stabilizer: Stabilizer<B>,
    active: bool,
}

impl<P: PulseOutput, B: RegisterBus> SpotlightGimbal<P, B> {
    /// Center both servos, then arm stabilization if a sensor is given.
    ///
    /// Fails only if the servo outputs cannot be driven; a sensor that fails
    /// to come up just leaves stabilization disabled.
    pub fn initialize(
        mut output: P,
        pitch_pin: u8,
        yaw_pin: u8,
        sensor: Option<Mpu6050<B>>,
    ) -> Result<Self> {
        output.set_pulse(pitch_pin, SERVO_CENTER_PULSE_US)?;
        output.set_pulse(yaw_pin, SERVO_CENTER_PULSE_US)?;
        log::info!("Servos initialized on GPIO pins {}, {}", pitch_pin, yaw_pin);

        let stabilizer = Stabilizer::arm(sensor);

        Ok(Self {
            output,
            pitch_pin,
            yaw_pin,
            target: PointingTarget::default(),
            last_signal: DriveSignal::Pulses {
                pitch_us: SERVO_CENTER_PULSE_US,
                yaw_us: SERVO_CENTER_PULSE_US,
            },
            last_orientation: None,
            stabilizer,
            active: true,
        })
    }

    /// Point at `pitch` (-90..90) and `yaw` (-180..180). Out-of-range
    /// angles are clamped; NaN or infinite angles are rejected.
    pub fn set_position(&mut self, pitch: f64, yaw: f64) -> Result<()> {
        ensure_finite(&[pitch, yaw], "spotlight position")?;
        self.target = PointingTarget {
            pitch: clamp_logged(pitch, PITCH_RANGE, "spotlight pitch"),
            yaw: clamp_logged(yaw, YAW_RANGE, "spotlight yaw"),
        };
        self.drive(self.target)
    }

    /// Rotation speed per axis, -100..100 percent, 0 = stop.
    pub fn set_speed(&mut self, pitch_speed: f64, yaw_speed: f64) -> Result<()> {
        ensure_finite(&[pitch_speed, yaw_speed], "spotlight speed")?;
        let pitch_us = speed_to_pulse(pitch_speed);
        let yaw_us = speed_to_pulse(yaw_speed);
        self.write_pulses(pitch_us, yaw_us)?;
        log::debug!("Set speed - Pitch: {}%, Yaw: {}%", pitch_speed, yaw_speed);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.set_speed(0.0, 0.0)
    }

    pub fn center(&mut self) -> Result<()> {
        self.set_position(0.0, 0.0)
    }

    pub fn orientation(&mut self) -> Result<Orientation> {
        let orientation = self.stabilizer.orientation()?;
        self.last_orientation = Some(orientation);
        Ok(orientation)
    }

    /// One stabilization update: the current target corrected for the
    /// measured tilt becomes the new position. Returns the new target.
    ///
    /// A failed sensor read leaves the target untouched.
    pub fn stabilize(&mut self) -> Result<PointingTarget> {
        let correction = self.stabilizer.correct(self.target)?;
        self.last_orientation = Some(correction.orientation);
        self.set_position(correction.target.pitch, correction.target.yaw)?;
        Ok(self.target)
    }

    /// Recalibrate the IMU. The platform must be level and still.
    pub fn calibrate(&mut self, samples: usize) -> Result<CalibrationOffset> {
        self.stabilizer.recalibrate(samples)
    }

    pub fn stabilization(&self) -> StabilizerState {
        self.stabilizer.state()
    }

    pub fn target(&self) -> PointingTarget {
        self.target
    }

    pub fn status(&self) -> SpotlightStatus {
        SpotlightStatus {
            target: self.target,
            last_signal: self.last_signal,
            stabilization: self.stabilizer.state(),
            last_orientation: self.last_orientation,
        }
    }

    /// Stop servo pulses and put the IMU to sleep.
    ///
    /// Every step is attempted even if an earlier one fails. On failure the
    /// gimbal stays active so a later close (or drop) tries again.
    pub fn close(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let pitch = self.output.set_pulse(self.pitch_pin, 0);
        let yaw = self.output.set_pulse(self.yaw_pin, 0);
        let sensor = self.stabilizer.close();
        pitch.and(yaw).and(sensor)?;

        self.active = false;
        log::info!("Spotlight gimbal shut down");
        Ok(())
    }

    fn drive(&mut self, position: PointingTarget) -> Result<()> {
        let pitch_us = angle_to_pulse(position.pitch, PITCH_RANGE.0, PITCH_RANGE.1);
        let yaw_us = angle_to_pulse(position.yaw, YAW_RANGE.0, YAW_RANGE.1);
        self.write_pulses(pitch_us, yaw_us)?;
        log::debug!(
            "Set position - Pitch: {:.2}° ({}μs), Yaw: {:.2}° ({}μs)",
            position.pitch,
            pitch_us,
            position.yaw,
            yaw_us
        );
        Ok(())
    }

    fn write_pulses(&mut self, pitch_us: u32, yaw_us: u32) -> Result<()> {
        self.output
            .set_pulse(self.pitch_pin, pitch_us)
            .inspect_err(|e| log::error!("Failed to drive pitch servo: {}", e))?;
        self.output
            .set_pulse(self.yaw_pin, yaw_us)
            .inspect_err(|e| log::error!("Failed to drive yaw servo: {}", e))?;
        self.last_signal = DriveSignal::Pulses { pitch_us, yaw_us };
        Ok(())
    }
}

impl<P: PulseOutput, B: RegisterBus> Drop for SpotlightGimbal<P, B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Error during spotlight shutdown: {}", e);
        }
    }
}
