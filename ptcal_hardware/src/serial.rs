use std::io::{ErrorKind, Read};
use std::time::Duration;

use ptcal_traits::SerialLink;
use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use crate::error::{HwError, Result};

/// `SerialLink` over a real serial device.
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortLink {
    /// Open `path` at `baud_rate`; every read blocks for at most `timeout`.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(HwError::from)?;
        debug!(path, baud_rate, timeout_ms = timeout.as_millis() as u64, "serial port opened");
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SerialLink for SerialPortLink {
    fn clear_input(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| Box::new(HwError::from(e)) as Box<dyn std::error::Error + Send + Sync>)
    }

    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> std::result::Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        match self.port.read(buf) {
            Ok(n) => {
                trace!(path = %self.path, n, "serial read");
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }
}

/// Names of the serial ports the OS currently reports.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(HwError::from)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
