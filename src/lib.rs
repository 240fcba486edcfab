pub mod config;
pub mod coordinator;
pub mod error;
pub mod i2c;
pub mod imu;
pub mod mapper;
pub mod pwm;
pub mod serial;
pub mod spotlight;
pub mod stabilizer;
pub mod storm32;
pub mod transport;
pub mod vector;

// Re-export commonly used types
pub use config::SystemConfig;
pub use coordinator::{DualGimbal, HardwareGimbals};
pub use error::{Error, Result};
pub use imu::{Mpu6050, Orientation};
pub use vector::Vector3;

#[cfg(test)]
pub(crate) mod mocks;
