use crate::error::{Error, Result};
use crate::transport::RegisterBus;
use rppal::i2c::I2c;

/// Raspberry Pi I2C bus driven through SMBus byte transfers.
pub struct I2cBus {
    i2c: I2c,
    slave: Option<u8>,
}

impl I2cBus {
    /// Open `/dev/i2c-<bus>`.
    pub fn open(bus: u8) -> Result<Self> {
        let i2c = I2c::with_bus(bus)
            .map_err(|e| Error::TransportUnavailable(format!("I2C bus {}: {}", bus, e)))?;
        log::debug!("Opened I2C bus {}", bus);
        Ok(Self { i2c, slave: None })
    }

    fn select(&mut self, addr: u8) -> Result<()> {
        if self.slave != Some(addr) {
            self.i2c.set_slave_address(u16::from(addr)).map_err(|e| {
                Error::TransportUnavailable(format!("I2C address 0x{:02X}: {}", addr, e))
            })?;
            self.slave = Some(addr);
        }
        Ok(())
    }
}

impl RegisterBus for I2cBus {
    fn read_byte(&mut self, addr: u8, reg: u8) -> Result<u8> {
        self.select(addr)?;
        self.i2c.smbus_read_byte(reg).map_err(|e| {
            Error::ReadFailure(format!("I2C 0x{:02X} reg 0x{:02X}: {}", addr, reg, e))
        })
    }

    fn write_byte(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.select(addr)?;
        self.i2c.smbus_write_byte(reg, value).map_err(|e| {
            Error::WriteFailure(format!("I2C 0x{:02X} reg 0x{:02X}: {}", addr, reg, e))
        })
    }
}
