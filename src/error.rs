//! Error types for the gimbal controllers

use std::fmt;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Which physical gimbal an operation was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actuator {
    Camera,
    Spotlight,
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actuator::Camera => write!(f, "camera gimbal"),
            Actuator::Spotlight => write!(f, "spotlight gimbal"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bus, serial port or PWM output could not be opened
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Operation attempted before a successful initialize
    #[error("Device not initialized")]
    NotInitialized,

    /// A register or serial read did not complete
    #[error("Read failed: {0}")]
    ReadFailure(String),

    /// A register, serial or pulse write did not complete
    #[error("Write failed: {0}")]
    WriteFailure(String),

    /// Stabilization requested but the IMU is absent or uncalibrated
    #[error("Stabilization disabled")]
    StabilizationDisabled,

    #[error("{0} not available")]
    ActuatorAbsent(Actuator),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}
