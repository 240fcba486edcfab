use std::collections::HashMap;
use std::time::Duration;

use rppal::gpio::{Gpio, OutputPin};
use rppal::pwm::{Channel, Polarity, Pwm};

use crate::config::SERVO_FREQUENCY_HZ;
use crate::error::{Error, Result};
use crate::transport::PulseOutput;

/// Servo frame period. 1/50Hz = 20ms.
fn servo_period() -> Duration {
    Duration::from_micros((1_000_000.0 / SERVO_FREQUENCY_HZ) as u64)
}

/// Hardware PWM is available on:
/// - GPIO 12 (PWM0)
/// - GPIO 13 (PWM1)
/// - GPIO 18 (PWM0) - Most commonly used
/// - GPIO 19 (PWM1)
fn hardware_channel(pin: u8) -> Result<Channel> {
    match pin {
        12 | 18 => Ok(Channel::Pwm0),
        13 | 19 => Ok(Channel::Pwm1),
        _ => Err(Error::InvalidParameter(format!(
            "GPIO {} has no hardware PWM. Use 12, 13, 18, or 19",
            pin
        ))),
    }
}

/// Software PWM on arbitrary GPIO pins. Pins are claimed on first use.
pub struct SoftwarePulseOutput {
    gpio: Gpio,
    pins: HashMap<u8, OutputPin>,
}

impl SoftwarePulseOutput {
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| Error::TransportUnavailable(format!("GPIO: {}", e)))?;
        Ok(Self {
            gpio,
            pins: HashMap::new(),
        })
    }

    fn pin(&mut self, channel: u8) -> Result<&mut OutputPin> {
        if !self.pins.contains_key(&channel) {
            let pin = self
                .gpio
                .get(channel)
                .map_err(|e| Error::TransportUnavailable(format!("GPIO {}: {}", channel, e)))?
                .into_output_low();
            self.pins.insert(channel, pin);
        }
        self.pins
            .get_mut(&channel)
            .ok_or_else(|| Error::TransportUnavailable(format!("GPIO {}", channel)))
    }
}

impl PulseOutput for SoftwarePulseOutput {
    fn set_pulse(&mut self, channel: u8, micros: u32) -> Result<()> {
        let pin = self.pin(channel)?;
        let result = if micros == 0 {
            pin.clear_pwm()
        } else {
            pin.set_pwm(servo_period(), Duration::from_micros(u64::from(micros)))
        };
        result.map_err(|e| Error::WriteFailure(format!("GPIO {} pulse: {}", channel, e)))
    }
}

/// Hardware PWM channels. Each GPIO must map to a distinct channel.
pub struct HardwarePulseOutput {
    channels: HashMap<u8, Pwm>,
}

impl HardwarePulseOutput {
    /// Claim one hardware channel per pin, output disabled until the first
    /// pulse is set.
    pub fn with_pins(pins: &[u8]) -> Result<Self> {
        let mut channels = HashMap::new();
        let mut claimed = Vec::new();
        for &pin in pins {
            let channel = hardware_channel(pin)?;
            if claimed.contains(&channel) {
                return Err(Error::InvalidParameter(format!(
                    "GPIO {} shares a hardware PWM channel with another pin",
                    pin
                )));
            }
            claimed.push(channel);

            let pwm = Pwm::with_period(
                channel,
                servo_period(),
                Duration::ZERO,
                Polarity::Normal,
                false,
            )
            .map_err(|e| Error::TransportUnavailable(format!("PWM for GPIO {}: {}", pin, e)))?;
            channels.insert(pin, pwm);
        }
        Ok(Self { channels })
    }
}

impl PulseOutput for HardwarePulseOutput {
    fn set_pulse(&mut self, channel: u8, micros: u32) -> Result<()> {
        let pwm = self
            .channels
            .get(&channel)
            .ok_or_else(|| Error::InvalidParameter(format!("GPIO {} not claimed", channel)))?;
        let write_failure = |e: rppal::pwm::Error| {
            Error::WriteFailure(format!("PWM GPIO {} pulse: {}", channel, e))
        };

        if micros == 0 {
            return pwm.disable().map_err(write_failure);
        }
        pwm.set_pulse_width(Duration::from_micros(u64::from(micros)))
            .map_err(write_failure)?;
        pwm.enable().map_err(write_failure)
    }
}

impl Drop for HardwarePulseOutput {
    fn drop(&mut self) {
        // Ensure PWM is disabled when dropped
        for pwm in self.channels.values() {
            let _ = pwm.disable();
        }
    }
}
