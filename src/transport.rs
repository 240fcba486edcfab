//! Transport capabilities consumed by the sensor and gimbal controllers.
//!
//! Every call blocks until the underlying device accepts or rejects it.
//! Implementations translate their own errors into [`Error`](crate::error::Error)
//! at this boundary.

use crate::error::Result;

/// Byte-wide register access on an I2C-style bus.
pub trait RegisterBus {
    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8>;

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()>;
}

/// Serial byte stream (UART).
pub trait ByteStream {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drain whatever is currently buffered. Empty when nothing arrived.
    fn read_available(&mut self) -> Result<Vec<u8>>;
}

/// Servo pulse generator addressed by GPIO number.
pub trait PulseOutput {
    /// Set the high time of the 50Hz servo signal. A width of 0 turns the
    /// output off.
    fn set_pulse(&mut self, channel: u8, micros: u32) -> Result<()>;
}

impl<T: PulseOutput + ?Sized> PulseOutput for Box<T> {
    fn set_pulse(&mut self, channel: u8, micros: u32) -> Result<()> {
        (**self).set_pulse(channel, micros)
    }
}
