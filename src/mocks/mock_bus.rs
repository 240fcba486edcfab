use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::{ACCEL_LSB_PER_G, GYRO_LSB_PER_DPS};
use crate::error::{Error, Result};
use crate::imu::registers;
use crate::transport::RegisterBus;

#[derive(Default)]
struct BusState {
    registers: HashMap<(u8, u8), u8>,
    writes: Vec<(u8, u8, u8)>,
    reads: usize,
    fail_reads_after: Option<usize>,
    fail_writes: bool,
}

/// Register map shared between the test and the component under test.
#[derive(Clone, Default)]
pub struct MockBus {
    state: Rc<RefCell<BusState>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// An MPU6050 at `addr` lying level and still: 1g on Z, nothing else.
    pub fn mpu6050_at_rest(addr: u8) -> Self {
        let bus = Self::new();
        bus.set_register(addr, registers::WHO_AM_I, 0x68);
        bus.set_accel_g(addr, 0.0, 0.0, 1.0);
        bus.set_gyro_dps(addr, 0.0, 0.0, 0.0);
        bus
    }

    pub fn set_register(&self, addr: u8, reg: u8, value: u8) {
        self.state.borrow_mut().registers.insert((addr, reg), value);
    }

    /// Store a big-endian 16-bit word at `reg` and `reg + 1`.
    pub fn set_word(&self, addr: u8, reg: u8, value: i16) {
        let [high, low] = value.to_be_bytes();
        self.set_register(addr, reg, high);
        self.set_register(addr, reg + 1, low);
    }

    pub fn set_accel_g(&self, addr: u8, x: f64, y: f64, z: f64) {
        for (i, g) in [x, y, z].into_iter().enumerate() {
            let raw = (g * ACCEL_LSB_PER_G).round() as i16;
            self.set_word(addr, registers::ACCEL_XOUT_H + 2 * i as u8, raw);
        }
    }

    pub fn set_gyro_dps(&self, addr: u8, x: f64, y: f64, z: f64) {
        for (i, dps) in [x, y, z].into_iter().enumerate() {
            let raw = (dps * GYRO_LSB_PER_DPS).round() as i16;
            self.set_word(addr, registers::GYRO_XOUT_H + 2 * i as u8, raw);
        }
    }

    /// Reads succeed `count` more times, then fail.
    pub fn fail_reads_after(&self, count: usize) {
        let mut state = self.state.borrow_mut();
        state.fail_reads_after = Some(state.reads + count);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    pub fn writes(&self) -> Vec<(u8, u8, u8)> {
        self.state.borrow().writes.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.borrow().reads
    }
}

impl RegisterBus for MockBus {
    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        let mut state = self.state.borrow_mut();
        if let Some(limit) = state.fail_reads_after
            && state.reads >= limit
        {
            return Err(Error::ReadFailure(format!(
                "mock 0x{:02X} reg 0x{:02X}",
                addr, reg
            )));
        }
        state.reads += 1;
        Ok(*state.registers.get(&(addr, reg)).unwrap_or(&0))
    }

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(Error::WriteFailure(format!(
                "mock 0x{:02X} reg 0x{:02X}",
                addr, reg
            )));
        }
        state.writes.push((addr, reg, value));
        state.registers.insert((addr, reg), value);
        Ok(())
    }
}
