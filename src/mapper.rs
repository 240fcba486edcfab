//! Angle/speed to drive-signal conversion.
//!
//! Servo outputs are pulse widths in microseconds; the Storm32 takes short
//! framed commands over serial. The frames here are a minimal framing, not
//! the controller's full MAVLink/RC command set.

use std::fmt;

use crate::config::{
    MAX_SPEED_PERCENT, PITCH_RANGE, ROLL_RANGE, SERVO_CENTER_PULSE_US, SERVO_MAX_PULSE_US,
    SERVO_MIN_PULSE_US, SPEED_PULSE_SCALE_US, YAW_RANGE,
};
use crate::error::{Error, Result};

pub const FRAME_SYNC: u8 = 0xFA;
pub const CMD_SET_ANGLE: u8 = 0x0E;
pub const CMD_SET_SPEED: u8 = 0x0F;
pub const CMD_GET_STATUS: u8 = 0x10;

/// Angles are sent in hundredths of a degree
const ANGLE_SCALE: f64 = 100.0;
/// Speeds are sent in tenths of a degree per second
const SPEED_SCALE: f64 = 10.0;

/// Header plus pitch, roll, yaw as little-endian i16.
pub const FRAME_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    fn new(command: u8, values: [i16; 3]) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = FRAME_SYNC;
        bytes[1] = command;
        for (i, value) in values.iter().enumerate() {
            let start = 2 + i * 2;
            bytes[start..start + 2].copy_from_slice(&value.to_le_bytes());
        }
        Self(bytes)
    }

    pub fn command(&self) -> u8 {
        self.0[1]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The last signal an actuator was driven with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveSignal {
    /// Servo pulse widths, μs
    Pulses { pitch_us: u32, yaw_us: u32 },
    /// Serial command frame
    Frame(CommandFrame),
}

impl fmt::Display for DriveSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveSignal::Pulses { pitch_us, yaw_us } => {
                write!(f, "pitch {}μs, yaw {}μs", pitch_us, yaw_us)
            }
            DriveSignal::Frame(frame) => {
                for (i, byte) in frame.as_bytes().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// Reject NaN and infinite command values before they reach an actuator.
pub fn ensure_finite(values: &[f64], what: &str) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{} must be finite, got {:?}",
            what, values
        )))
    }
}

/// Clamp `value` into `(min, max)`. Clamping is not an error but is logged.
pub fn clamp_logged(value: f64, (min, max): (f64, f64), what: &str) -> f64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::debug!("{} {:.2} clamped to {:.2}", what, value, clamped);
    }
    clamped
}

/// Map `angle` linearly from `[min_angle, max_angle]` onto the servo pulse
/// range. Angles outside the interval extrapolate, then get clamped. A NaN
/// angle maps to the center pulse.
///
/// # Panics
///
/// Panics if `min_angle` is not strictly less than `max_angle`.
pub fn angle_to_pulse(angle: f64, min_angle: f64, max_angle: f64) -> u32 {
    assert!(
        min_angle < max_angle,
        "angle range [{}, {}] is empty",
        min_angle,
        max_angle
    );
    if angle.is_nan() {
        return SERVO_CENTER_PULSE_US;
    }
    let normalized = (angle - min_angle) / (max_angle - min_angle);
    let span = f64::from(SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US);
    let pulse = f64::from(SERVO_MIN_PULSE_US) + (normalized * span).trunc();
    pulse.clamp(f64::from(SERVO_MIN_PULSE_US), f64::from(SERVO_MAX_PULSE_US)) as u32
}

/// Continuous-rotation servo speed. ±100% is ±500μs around center (stop).
/// NaN means stop.
pub fn speed_to_pulse(speed_percent: f64) -> u32 {
    if speed_percent.is_nan() {
        return SERVO_CENTER_PULSE_US;
    }
    let speed = clamp_logged(
        speed_percent,
        (-MAX_SPEED_PERCENT, MAX_SPEED_PERCENT),
        "speed %",
    );
    (f64::from(SERVO_CENTER_PULSE_US) + (speed * SPEED_PULSE_SCALE_US).trunc()) as u32
}

/// Truncate toward zero; saturates at the i16 bounds.
fn scale(value: f64, factor: f64) -> i16 {
    (value * factor) as i16
}

pub fn encode_angle_command(pitch: f64, roll: f64, yaw: f64) -> CommandFrame {
    let pitch = clamp_logged(pitch, PITCH_RANGE, "pitch");
    let roll = clamp_logged(roll, ROLL_RANGE, "roll");
    let yaw = clamp_logged(yaw, YAW_RANGE, "yaw");
    CommandFrame::new(
        CMD_SET_ANGLE,
        [
            scale(pitch, ANGLE_SCALE),
            scale(roll, ANGLE_SCALE),
            scale(yaw, ANGLE_SCALE),
        ],
    )
}

/// Rotation speeds in °/s. Speeds beyond ±3276.7°/s saturate.
pub fn encode_speed_command(pitch_speed: f64, roll_speed: f64, yaw_speed: f64) -> CommandFrame {
    CommandFrame::new(
        CMD_SET_SPEED,
        [
            scale(pitch_speed, SPEED_SCALE),
            scale(roll_speed, SPEED_SCALE),
            scale(yaw_speed, SPEED_SCALE),
        ],
    )
}

pub fn encode_status_request() -> [u8; 2] {
    [FRAME_SYNC, CMD_GET_STATUS]
}
