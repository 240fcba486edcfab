use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ** SERVO CONFIGURATION ** //

/// Standard servo pulse width range (microseconds)
/// Most servos use 1000-2000μs, with 1500μs as center (stop for 360° servos)
pub const SERVO_MIN_PULSE_US: u32 = 1000;
pub const SERVO_MAX_PULSE_US: u32 = 2000;
pub const SERVO_CENTER_PULSE_US: u32 = 1500;
/// Standard servo PWM frequency (Hz)
pub const SERVO_FREQUENCY_HZ: f64 = 50.0;
/// ±100% speed maps to ±500μs around center
pub const SPEED_PULSE_SCALE_US: f64 = 5.0;
pub const MAX_SPEED_PERCENT: f64 = 100.0;

// ** ANGLE RANGES (degrees) ** //
pub const PITCH_RANGE: (f64, f64) = (-90.0, 90.0);
pub const ROLL_RANGE: (f64, f64) = (-90.0, 90.0);
pub const YAW_RANGE: (f64, f64) = (-180.0, 180.0);

// ** IMU CONFIGURATION ** //

/// Default MPU6050 address (AD0 low)
pub const MPU6050_DEFAULT_ADDR: u8 = 0x68;
/// ±2g full scale
pub const ACCEL_LSB_PER_G: f64 = 16384.0;
/// ±250°/s full scale
pub const GYRO_LSB_PER_DPS: f64 = 131.0;
pub const TEMP_LSB_PER_DEG_C: f64 = 340.0;
pub const TEMP_OFFSET_DEG_C: f64 = 36.53;
pub const CALIBRATION_SAMPLES: usize = 100;
pub const CALIBRATION_SAMPLE_DELAY_MS: u64 = 10;
pub const IMU_SETTLE_MS: u64 = 100;

// ** STABILIZATION CONFIGURATION ** //

/// Proportional gain applied to the measured tilt
pub const STABILIZATION_GAIN: f64 = 0.5;
pub const STABILIZATION_INTERVAL_SECS: f64 = 0.1; // 10Hz

// ** STORM32 CONFIGURATION ** //
pub const STORM32_STATUS_WAIT_MS: u64 = 100;

/// Top-level system configuration, loaded from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub camera_gimbal: CameraGimbalConfig,
    pub spotlight_gimbal: SpotlightGimbalConfig,
    pub stabilization: StabilizationConfig,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Storm32 serial link
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraGimbalConfig {
    pub enabled: bool,
    pub serial_port: String,
    pub baudrate: u32,
    pub timeout_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PwmBackend {
    /// Software PWM, any GPIO pin
    Software,
    /// Hardware PWM, GPIO 12/13/18/19 only
    Hardware,
}

/// Continuous-rotation servos plus the stabilization IMU
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpotlightGimbalConfig {
    pub enabled: bool,
    pub pitch_pin: u8,
    pub yaw_pin: u8,
    pub i2c_address: u8,
    pub i2c_bus: u8,
    pub use_stabilization: bool,
    pub pwm_backend: PwmBackend,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StabilizationConfig {
    pub interval_secs: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            camera_gimbal: CameraGimbalConfig::default(),
            spotlight_gimbal: SpotlightGimbalConfig::default(),
            stabilization: StabilizationConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for CameraGimbalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            serial_port: "/dev/ttyAMA0".to_string(),
            baudrate: 115_200,
            timeout_secs: 1.0,
        }
    }
}

impl Default for SpotlightGimbalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pitch_pin: 17,
            yaw_pin: 27,
            i2c_address: MPU6050_DEFAULT_ADDR,
            i2c_bus: 1,
            use_stabilization: true,
            pwm_backend: PwmBackend::Software,
        }
    }
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            interval_secs: STABILIZATION_INTERVAL_SECS,
        }
    }
}

fn positive_duration(secs: f64, what: &str) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(Error::InvalidParameter(format!(
            "{} must be a positive number of seconds, got {}",
            what, secs
        ))),
    }
}

impl CameraGimbalConfig {
    pub fn timeout(&self) -> Result<Duration> {
        positive_duration(self.timeout_secs, "camera_gimbal.timeout_secs")
    }
}

impl StabilizationConfig {
    pub fn interval(&self) -> Result<Duration> {
        positive_duration(self.interval_secs, "stabilization.interval_secs")
    }
}

impl SystemConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the default configuration; a file that exists
    /// but does not parse is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Filter string handed to env_logger when RUST_LOG is unset.
    pub fn log_filter(&self) -> &str {
        if self.log_level.is_empty() {
            "info"
        } else {
            &self.log_level
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults_match_hardware_wiring() {
        let config = SystemConfig::default();
        assert_eq!(config.camera_gimbal.serial_port, "/dev/ttyAMA0");
        assert_eq!(config.camera_gimbal.baudrate, 115_200);
        assert_eq!(config.spotlight_gimbal.pitch_pin, 17);
        assert_eq!(config.spotlight_gimbal.yaw_pin, 27);
        assert_eq!(config.spotlight_gimbal.i2c_address, 0x68);
        assert_eq!(config.spotlight_gimbal.pwm_backend, PwmBackend::Software);
        assert_eq!(config.stabilization.interval_secs, 0.1);
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: SystemConfig = toml::from_str(
            r#"
            log_level = "debug"

            [spotlight_gimbal]
            yaw_pin = 22
            pwm_backend = "hardware"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_filter(), "debug");
        assert_eq!(config.spotlight_gimbal.yaw_pin, 22);
        assert_eq!(config.spotlight_gimbal.pitch_pin, 17);
        assert_eq!(config.spotlight_gimbal.pwm_backend, PwmBackend::Hardware);
        assert!(config.camera_gimbal.enabled);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("airborne-gimbal-does-not-exist.toml");
        let config = SystemConfig::load(&path).unwrap();
        assert_eq!(config, SystemConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join(format!(
            "airborne-gimbal-config-{}.toml",
            std::process::id()
        ));
        let mut config = SystemConfig::default();
        config.camera_gimbal.serial_port = "/dev/ttyUSB0".to_string();
        config.spotlight_gimbal.use_stabilization = false;

        config.save(&path).unwrap();
        let loaded = SystemConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "airborne-gimbal-bad-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "camera_gimbal = [").unwrap();
        let result = SystemConfig::load(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_durations_must_be_positive() {
        let mut config = SystemConfig::default();
        let interval = config.stabilization.interval().unwrap();
        assert_abs_diff_eq!(interval.as_secs_f64(), 0.1, epsilon = 1e-9);
        assert_eq!(config.camera_gimbal.timeout().unwrap(), Duration::from_secs(1));

        config.stabilization.interval_secs = 0.0;
        assert!(matches!(
            config.stabilization.interval(),
            Err(Error::InvalidParameter(_))
        ));
        config.camera_gimbal.timeout_secs = -1.0;
        assert!(config.camera_gimbal.timeout().is_err());
    }
}
