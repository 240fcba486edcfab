use crate::error::{Error, Result};
use crate::transport::ByteStream;
use rppal::uart::{Parity, Uart};
use std::time::Duration;

/// UART link to the Storm32 controller (8N1).
pub struct SerialStream {
    uart: Uart,
}

impl SerialStream {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyAMA0")
    /// * `baud_rate` - Baud rate (e.g., 115200)
    /// * `read_timeout` - Longest a read may wait for its first byte
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let unavailable = |e: rppal::uart::Error| {
            Error::TransportUnavailable(format!("serial port {}: {}", path, e))
        };

        let mut uart = Uart::with_path(path, baud_rate, Parity::None, 8, 1).map_err(unavailable)?;
        uart.set_read_mode(0, read_timeout).map_err(unavailable)?;
        uart.set_write_mode(true).map_err(unavailable)?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);
        Ok(Self { uart })
    }
}

impl ByteStream for SerialStream {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let written = self
            .uart
            .write(bytes)
            .map_err(|e| Error::WriteFailure(format!("serial: {}", e)))?;
        if written != bytes.len() {
            return Err(Error::WriteFailure(format!(
                "serial: short write {}/{} bytes",
                written,
                bytes.len()
            )));
        }
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let pending = self
            .uart
            .input_len()
            .map_err(|e| Error::ReadFailure(format!("serial: {}", e)))?;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; pending];
        let read = self
            .uart
            .read(&mut buffer)
            .map_err(|e| Error::ReadFailure(format!("serial: {}", e)))?;
        buffer.truncate(read);
        Ok(buffer)
    }
}
