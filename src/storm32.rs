use std::thread;
use std::time::Duration;

use crate::config::{PITCH_RANGE, ROLL_RANGE, STORM32_STATUS_WAIT_MS, YAW_RANGE};
use crate::error::{Error, Result};
use crate::mapper::{
    CommandFrame, DriveSignal, clamp_logged, encode_angle_command, encode_speed_command,
    encode_status_request, ensure_finite,
};
use crate::transport::ByteStream;

/// Commanded camera angles, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraAngles {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

/// Reply to a status request.
///
/// The controller's reply is not decoded; only its length is reported
/// alongside what was last commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraStatus {
    pub commanded: CameraAngles,
    pub last_signal: Option<DriveSignal>,
    pub response_len: usize,
}

/// 3-axis brushless camera gimbal on a Storm32 BGC controller.
pub struct Storm32Gimbal<S: ByteStream> {
    stream: S,
    connected: bool,
    commanded: CameraAngles,
    last_signal: Option<DriveSignal>,
    status_wait: Duration,
}

impl<S: ByteStream> Storm32Gimbal<S> {
    /// Wrap an already opened serial link.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            connected: true,
            commanded: CameraAngles::default(),
            last_signal: None,
            status_wait: Duration::from_millis(STORM32_STATUS_WAIT_MS),
        }
    }

    /// How long [`status`](Self::status) waits for the reply.
    pub fn with_status_wait(mut self, wait: Duration) -> Self {
        self.status_wait = wait;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Pitch and roll are clamped to -90..90, yaw to -180..180.
    pub fn set_angle(&mut self, pitch: f64, roll: f64, yaw: f64) -> Result<()> {
        self.ensure_connected()?;
        ensure_finite(&[pitch, roll, yaw], "camera angles")?;
        let angles = CameraAngles {
            pitch: clamp_logged(pitch, PITCH_RANGE, "camera pitch"),
            roll: clamp_logged(roll, ROLL_RANGE, "camera roll"),
            yaw: clamp_logged(yaw, YAW_RANGE, "camera yaw"),
        };

        self.send(encode_angle_command(angles.pitch, angles.roll, angles.yaw))?;
        self.commanded = angles;
        log::debug!(
            "Set angles - Pitch: {}, Roll: {}, Yaw: {}",
            angles.pitch,
            angles.roll,
            angles.yaw
        );
        Ok(())
    }

    /// Rotation speeds in °/s.
    pub fn set_speed(&mut self, pitch_speed: f64, roll_speed: f64, yaw_speed: f64) -> Result<()> {
        self.ensure_connected()?;
        ensure_finite(&[pitch_speed, roll_speed, yaw_speed], "camera speeds")?;
        self.send(encode_speed_command(pitch_speed, roll_speed, yaw_speed))?;
        log::debug!(
            "Set speeds - Pitch: {}, Roll: {}, Yaw: {}",
            pitch_speed,
            roll_speed,
            yaw_speed
        );
        Ok(())
    }

    pub fn center(&mut self) -> Result<()> {
        self.set_angle(0.0, 0.0, 0.0)
    }

    pub fn commanded(&self) -> CameraAngles {
        self.commanded
    }

    /// Request status and wait for any reply.
    pub fn status(&mut self) -> Result<CameraStatus> {
        self.ensure_connected()?;
        self.stream
            .write(&encode_status_request())
            .inspect_err(|e| log::error!("Failed to request Storm32 status: {}", e))?;
        thread::sleep(self.status_wait);

        let response = self.stream.read_available()?;
        if response.is_empty() {
            return Err(Error::ReadFailure("no status response from Storm32".to_string()));
        }
        log::debug!("Storm32 status response: {} bytes", response.len());

        Ok(CameraStatus {
            commanded: self.commanded,
            last_signal: self.last_signal,
            response_len: response.len(),
        })
    }

    pub fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            log::info!("Disconnected from Storm32");
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn send(&mut self, frame: CommandFrame) -> Result<()> {
        self.stream
            .write(frame.as_bytes())
            .inspect_err(|e| log::error!("Failed to send Storm32 command: {}", e))?;
        self.last_signal = Some(DriveSignal::Frame(frame));
        Ok(())
    }
}

impl<S: ByteStream> Drop for Storm32Gimbal<S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
