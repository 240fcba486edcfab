//! MPU6050 accelerometer/gyroscope over a register bus.
//!
//! Raw readings are converted with the ±2g and ±250°/s full-scale
//! sensitivities, then corrected by the offsets of the last successful
//! calibration. Tilt is estimated from the gravity vector alone: accurate at
//! rest or under gentle manoeuvring, biased under sustained lateral
//! acceleration (e.g. a banked turn).

use std::fmt;
use std::thread;
use std::time::Duration;

use crate::config::{
    ACCEL_LSB_PER_G, CALIBRATION_SAMPLE_DELAY_MS, GYRO_LSB_PER_DPS, IMU_SETTLE_MS,
    MPU6050_DEFAULT_ADDR, TEMP_LSB_PER_DEG_C, TEMP_OFFSET_DEG_C,
};
use crate::error::{Error, Result};
use crate::transport::RegisterBus;
use crate::vector::Vector3;

/// MPU6050 register addresses
pub mod registers {
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const CONFIG: u8 = 0x1A;
    pub const GYRO_CONFIG: u8 = 0x1B;
    pub const ACCEL_CONFIG: u8 = 0x1C;
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    pub const TEMP_OUT_H: u8 = 0x41;
    pub const GYRO_XOUT_H: u8 = 0x43;
    pub const PWR_MGMT_1: u8 = 0x6B;
    pub const WHO_AM_I: u8 = 0x75;
}

const EXPECTED_WHO_AM_I: u8 = 0x68;
const PWR_MGMT_WAKE: u8 = 0x00;
const PWR_MGMT_SLEEP: u8 = 0x40;
/// 1kHz / (1 + 7) = 125Hz sample rate
const SAMPLE_RATE_DIVIDER: u8 = 0x07;
/// FS_SEL = 0 (±250°/s), AFS_SEL = 0 (±2g)
const FULL_SCALE_SMALLEST: u8 = 0x00;

/// Interpret an unsigned 16-bit register pair as two's complement.
pub fn to_signed(raw: u16) -> i16 {
    raw as i16
}

/// One sensor poll, already calibrated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertialReading {
    /// g
    pub acceleration: Vector3,
    /// °/s
    pub angular_rate: Vector3,
    /// °C
    pub temperature: f64,
}

/// Additive bias removed from every reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationOffset {
    pub acceleration: Vector3,
    pub angular_rate: Vector3,
}

/// Tilt in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    /// Estimate tilt from an acceleration vector in g.
    pub fn from_acceleration(accel: Vector3) -> Self {
        let pitch = accel
            .y
            .atan2((accel.x * accel.x + accel.z * accel.z).sqrt())
            .to_degrees();
        let roll = (-accel.x).atan2(accel.z).to_degrees();
        Self { pitch, roll }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pitch {:.2}°, roll {:.2}°", self.pitch, self.roll)
    }
}

pub struct Mpu6050<B: RegisterBus> {
    bus: B,
    address: u8,
    offset: CalibrationOffset,
    initialized: bool,
    calibrated: bool,
    settle: Duration,
    sample_delay: Duration,
}

impl<B: RegisterBus> Mpu6050<B> {
    pub fn new(bus: B) -> Self {
        Self::with_address(bus, MPU6050_DEFAULT_ADDR)
    }

    pub fn with_address(bus: B, address: u8) -> Self {
        Self {
            bus,
            address,
            offset: CalibrationOffset::default(),
            initialized: false,
            calibrated: false,
            settle: Duration::from_millis(IMU_SETTLE_MS),
            sample_delay: Duration::from_millis(CALIBRATION_SAMPLE_DELAY_MS),
        }
    }

    /// Override the power-up settle time and the pause between calibration
    /// samples.
    pub fn with_timing(mut self, settle: Duration, sample_delay: Duration) -> Self {
        self.settle = settle;
        self.sample_delay = sample_delay;
        self
    }

    /// Wake the device and select the smallest full-scale ranges.
    ///
    /// Safe to call again; the configuration writes are simply repeated.
    pub fn initialize(&mut self) -> Result<()> {
        self.initialized = false;

        self.write(registers::PWR_MGMT_1, PWR_MGMT_WAKE)?;
        self.write(registers::SMPLRT_DIV, SAMPLE_RATE_DIVIDER)?;
        self.write(registers::CONFIG, 0x00)?;
        self.write(registers::GYRO_CONFIG, FULL_SCALE_SMALLEST)?;
        self.write(registers::ACCEL_CONFIG, FULL_SCALE_SMALLEST)?;

        let who_am_i = self.bus.read_byte(self.address, registers::WHO_AM_I)?;
        if who_am_i != EXPECTED_WHO_AM_I {
            log::warn!(
                "MPU6050 at 0x{:02X} reports id 0x{:02X}, expected 0x{:02X}",
                self.address,
                who_am_i,
                EXPECTED_WHO_AM_I
            );
        }

        thread::sleep(self.settle);
        self.initialized = true;
        log::info!("MPU6050 initialized at 0x{:02X}", self.address);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn offset(&self) -> CalibrationOffset {
        self.offset
    }

    /// Acceleration in g, calibration applied.
    pub fn read_acceleration(&mut self) -> Result<Vector3> {
        Ok(self.read_raw_acceleration()? - self.offset.acceleration)
    }

    /// Angular rate in °/s, calibration applied.
    pub fn read_angular_rate(&mut self) -> Result<Vector3> {
        Ok(self.read_raw_angular_rate()? - self.offset.angular_rate)
    }

    pub fn read_temperature(&mut self) -> Result<f64> {
        self.ensure_initialized()?;
        let raw = self.read_word(registers::TEMP_OUT_H)?;
        Ok(f64::from(raw) / TEMP_LSB_PER_DEG_C + TEMP_OFFSET_DEG_C)
    }

    pub fn read(&mut self) -> Result<InertialReading> {
        Ok(InertialReading {
            acceleration: self.read_acceleration()?,
            angular_rate: self.read_angular_rate()?,
            temperature: self.read_temperature()?,
        })
    }

    /// Average `samples` readings taken while the sensor rests level.
    ///
    /// Z acceleration is averaged relative to 1g. The stored offset is only
    /// replaced once every sample has been read; a failed read leaves the
    /// previous calibration in place.
    pub fn calibrate(&mut self, samples: usize) -> Result<CalibrationOffset> {
        self.ensure_initialized()?;
        if samples == 0 {
            return Err(Error::InvalidParameter(
                "calibration needs at least one sample".to_string(),
            ));
        }

        log::info!("Calibrating MPU6050 over {} samples, keep it level", samples);
        let gravity = Vector3::new(0.0, 0.0, 1.0);
        let mut accel_sum = Vector3::ZERO;
        let mut gyro_sum = Vector3::ZERO;

        for i in 0..samples {
            let accel = self.read_raw_acceleration().inspect_err(|e| {
                log::error!("Calibration aborted at sample {}: {}", i, e);
            })?;
            let gyro = self.read_raw_angular_rate().inspect_err(|e| {
                log::error!("Calibration aborted at sample {}: {}", i, e);
            })?;
            accel_sum = accel_sum + (accel - gravity);
            gyro_sum = gyro_sum + gyro;

            if i + 1 < samples {
                thread::sleep(self.sample_delay);
            }
        }

        let count = samples as f64;
        self.offset = CalibrationOffset {
            acceleration: accel_sum / count,
            angular_rate: gyro_sum / count,
        };
        self.calibrated = true;
        log::info!(
            "Calibration complete - accel offset {} g, gyro offset {} °/s",
            self.offset.acceleration,
            self.offset.angular_rate
        );
        Ok(self.offset)
    }

    /// Tilt from a fresh calibrated accelerometer reading.
    pub fn orientation(&mut self) -> Result<Orientation> {
        Ok(Orientation::from_acceleration(self.read_acceleration()?))
    }

    /// Put the device to sleep. Further reads need a new initialize.
    pub fn close(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;
        self.write(registers::PWR_MGMT_1, PWR_MGMT_SLEEP)?;
        log::debug!("MPU6050 at 0x{:02X} put to sleep", self.address);
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<()> {
        self.bus.write_byte(self.address, reg, value)
    }

    /// Big-endian signed word at `reg`, `reg + 1`.
    fn read_word(&mut self, reg: u8) -> Result<i16> {
        let high = self.bus.read_byte(self.address, reg)?;
        let low = self.bus.read_byte(self.address, reg + 1)?;
        Ok(to_signed(u16::from_be_bytes([high, low])))
    }

    fn read_axes(&mut self, start: u8, lsb_per_unit: f64) -> Result<Vector3> {
        self.ensure_initialized()?;
        let x = self.read_word(start)?;
        let y = self.read_word(start + 2)?;
        let z = self.read_word(start + 4)?;
        Ok(Vector3::new(
            f64::from(x) / lsb_per_unit,
            f64::from(y) / lsb_per_unit,
            f64::from(z) / lsb_per_unit,
        ))
    }

    fn read_raw_acceleration(&mut self) -> Result<Vector3> {
        self.read_axes(registers::ACCEL_XOUT_H, ACCEL_LSB_PER_G)
    }

    fn read_raw_angular_rate(&mut self) -> Result<Vector3> {
        self.read_axes(registers::GYRO_XOUT_H, GYRO_LSB_PER_DPS)
    }
}

impl<B: RegisterBus> Drop for Mpu6050<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to put MPU6050 to sleep: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBus;
    use approx::assert_abs_diff_eq;

    const ADDR: u8 = MPU6050_DEFAULT_ADDR;
    /// Bytes read per accel + gyro sample
    const READS_PER_SAMPLE: usize = 12;

    fn sensor(bus: &MockBus) -> Mpu6050<MockBus> {
        Mpu6050::new(bus.clone()).with_timing(Duration::ZERO, Duration::ZERO)
    }

    fn ready_sensor(bus: &MockBus) -> Mpu6050<MockBus> {
        let mut mpu = sensor(bus);
        mpu.initialize().unwrap();
        mpu
    }

    #[test]
    fn test_signed_conversion() {
        assert_eq!(to_signed(0), 0);
        assert_eq!(to_signed(1), 1);
        assert_eq!(to_signed(32767), 32767);
        assert_eq!(to_signed(32768), -32768);
        assert_eq!(to_signed(65535), -1);
        for raw in (0..=u16::MAX).step_by(997) {
            let expected = if raw >= 32768 {
                i32::from(raw) - 65536
            } else {
                i32::from(raw)
            };
            assert_eq!(i32::from(to_signed(raw)), expected);
        }
    }

    #[test]
    fn test_initialize_configures_device() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        let mpu = ready_sensor(&bus);

        assert!(mpu.is_initialized());
        assert!(!mpu.is_calibrated());
        let writes = bus.writes();
        assert!(writes.contains(&(ADDR, registers::PWR_MGMT_1, PWR_MGMT_WAKE)));
        assert!(writes.contains(&(ADDR, registers::ACCEL_CONFIG, 0x00)));
        assert!(writes.contains(&(ADDR, registers::GYRO_CONFIG, 0x00)));
    }

    #[test]
    fn test_initialize_twice_is_harmless() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        let mut mpu = ready_sensor(&bus);
        let first = bus.writes().len();

        mpu.initialize().unwrap();

        assert!(mpu.is_initialized());
        assert_eq!(bus.writes().len(), first * 2);
    }

    #[test]
    fn test_initialize_fails_when_writes_fail() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        bus.fail_writes(true);
        let mut mpu = sensor(&bus);

        assert!(matches!(mpu.initialize(), Err(Error::WriteFailure(_))));
        assert!(!mpu.is_initialized());
    }

    #[test]
    fn test_reads_before_initialize_fail() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        let mut mpu = sensor(&bus);

        assert!(matches!(mpu.read_acceleration(), Err(Error::NotInitialized)));
        assert!(matches!(mpu.read_angular_rate(), Err(Error::NotInitialized)));
        assert!(matches!(mpu.read_temperature(), Err(Error::NotInitialized)));
        assert!(matches!(mpu.calibrate(10), Err(Error::NotInitialized)));
        assert_eq!(bus.reads(), 0);
    }

    #[test]
    fn test_unit_conversion() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        bus.set_word(ADDR, registers::ACCEL_XOUT_H, 8192);
        bus.set_word(ADDR, registers::ACCEL_XOUT_H + 2, -16384);
        bus.set_word(ADDR, registers::GYRO_XOUT_H + 4, 131 * 10);
        bus.set_word(ADDR, registers::TEMP_OUT_H, 340);
        let mut mpu = ready_sensor(&bus);

        let accel = mpu.read_acceleration().unwrap();
        assert_abs_diff_eq!(accel.x, 0.5);
        assert_abs_diff_eq!(accel.y, -1.0);
        assert_abs_diff_eq!(accel.z, 1.0);

        let gyro = mpu.read_angular_rate().unwrap();
        assert_abs_diff_eq!(gyro.z, 10.0);

        assert_abs_diff_eq!(mpu.read_temperature().unwrap(), 37.53, epsilon = 1e-9);
    }

    #[test]
    fn test_temperature_at_zero_raw() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        let mut mpu = ready_sensor(&bus);
        assert_abs_diff_eq!(mpu.read_temperature().unwrap(), 36.53, epsilon = 1e-9);
    }

    #[test]
    fn test_calibration_at_rest_yields_zero_offsets() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        let mut mpu = ready_sensor(&bus);

        let offset = mpu.calibrate(20).unwrap();

        assert_eq!(offset.acceleration, Vector3::ZERO);
        assert_eq!(offset.angular_rate, Vector3::ZERO);
        assert!(mpu.is_calibrated());
    }

    #[test]
    fn test_calibration_cancels_bias() {
        let bus = MockBus::new();
        bus.set_accel_g(ADDR, 0.25, -0.125, 1.0625);
        bus.set_gyro_dps(ADDR, 2.0, -1.0, 0.5);
        let mut mpu = ready_sensor(&bus);

        let offset = mpu.calibrate(5).unwrap();
        assert_abs_diff_eq!(offset.acceleration.x, 0.25);
        assert_abs_diff_eq!(offset.acceleration.y, -0.125);
        assert_abs_diff_eq!(offset.acceleration.z, 0.0625);

        // Gravity stays on Z; everything else cancels.
        let accel = mpu.read_acceleration().unwrap();
        assert_abs_diff_eq!(accel.x, 0.0);
        assert_abs_diff_eq!(accel.y, 0.0);
        assert_abs_diff_eq!(accel.z, 1.0);

        let gyro = mpu.read_angular_rate().unwrap();
        assert_abs_diff_eq!(gyro.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(gyro.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(gyro.z, 0.0, epsilon = 1e-9);

        let orientation = mpu.orientation().unwrap();
        assert_abs_diff_eq!(orientation.pitch, 0.0);
        assert_abs_diff_eq!(orientation.roll, 0.0);
    }

    #[test]
    fn test_failed_calibration_keeps_previous_offset() {
        let bus = MockBus::new();
        bus.set_accel_g(ADDR, 0.25, 0.0, 1.0);
        let mut mpu = ready_sensor(&bus);
        let previous = mpu.calibrate(3).unwrap();

        // Different bias, but the bus dies halfway through.
        bus.set_accel_g(ADDR, -0.5, 0.5, 1.0);
        bus.fail_reads_after(READS_PER_SAMPLE * 4 + 3);

        assert!(matches!(mpu.calibrate(10), Err(Error::ReadFailure(_))));
        assert_eq!(mpu.offset(), previous);
        assert!(mpu.is_calibrated());
    }

    #[test]
    fn test_calibration_rejects_zero_samples() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        let mut mpu = ready_sensor(&bus);
        assert!(matches!(mpu.calibrate(0), Err(Error::InvalidParameter(_))));
        assert!(!mpu.is_calibrated());
    }

    #[test]
    fn test_orientation_level() {
        let level = Orientation::from_acceleration(Vector3::new(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(level.pitch, 0.0);
        assert_abs_diff_eq!(level.roll, 0.0);
    }

    #[test]
    fn test_orientation_tilted() {
        let half_sqrt3 = 3.0_f64.sqrt() / 2.0;

        let nose = Orientation::from_acceleration(Vector3::new(0.0, 0.5, half_sqrt3));
        assert_abs_diff_eq!(nose.pitch, 30.0, epsilon = 1e-9);
        assert_abs_diff_eq!(nose.roll, 0.0, epsilon = 1e-9);

        let banked = Orientation::from_acceleration(Vector3::new(-0.5, 0.0, half_sqrt3));
        assert_abs_diff_eq!(banked.pitch, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(banked.roll, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_read_snapshot() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        bus.set_gyro_dps(ADDR, 1.0, 0.0, 0.0);
        let mut mpu = ready_sensor(&bus);

        let reading = mpu.read().unwrap();
        assert_abs_diff_eq!(reading.acceleration.z, 1.0);
        assert_abs_diff_eq!(reading.angular_rate.x, 1.0);
        assert_abs_diff_eq!(reading.temperature, 36.53, epsilon = 1e-9);
    }

    #[test]
    fn test_drop_puts_device_to_sleep() {
        let bus = MockBus::mpu6050_at_rest(ADDR);
        {
            let _mpu = ready_sensor(&bus);
        }
        assert_eq!(
            bus.writes().last(),
            Some(&(ADDR, registers::PWR_MGMT_1, PWR_MGMT_SLEEP))
        );
    }
}
