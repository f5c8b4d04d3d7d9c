pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;

#[cfg(feature = "hardware")]
pub use serial::{SerialPortLink, available_ports};

use ptcal_traits::SerialLink;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::HwError;

/// Largest chunk a simulated read hands back, so callers see partial reads.
const SIM_CHUNK: usize = 16;

/// Pressure currently "applied" to a simulated bank. Cloned handles share
/// the same value, so the operator side can move the set-point while the
/// link is owned by a bank.
#[derive(Debug, Clone, Default)]
pub struct SimPressure(Arc<AtomicU64>);

impl SimPressure {
    pub fn new(psi: f64) -> Self {
        Self(Arc::new(AtomicU64::new(psi.to_bits())))
    }

    pub fn set(&self, psi: f64) {
        self.0.store(psi.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Simulated PT bank: streams `sensor_count` little-endian f32 voltages
/// followed by `terminator`, forever.
///
/// Sensor `i` reports `0.5 + (0.004 + 0.0005 * i) * psi` volts, quantized to
/// 1/1024 V and clamped to [0.5, 4095/1024]. With that range no encoded float can
/// contain a `\r\n` pair, so a resync always lands on a real frame boundary.
/// After `clear_input` the stream restarts in the middle of a frame.
pub struct SimulatedLink {
    sensor_count: usize,
    terminator: Vec<u8>,
    pressure: SimPressure,
    pending: VecDeque<u8>,
    skew: usize,
    force_timeout: bool,
}

impl SimulatedLink {
    pub fn new(sensor_count: usize, terminator: &[u8]) -> Self {
        let mut link = SimulatedLink {
            sensor_count,
            terminator: terminator.to_vec(),
            pressure: SimPressure::default(),
            pending: VecDeque::new(),
            skew: 3,
            force_timeout: false,
        };
        link.push_partial_frame();
        link
    }

    /// Share an externally controlled pressure handle.
    pub fn with_pressure(mut self, pressure: SimPressure) -> Self {
        self.pressure = pressure;
        self
    }

    /// Make every read time out (no data), as an unplugged device would.
    pub fn with_forced_timeout(mut self, on: bool) -> Self {
        self.force_timeout = on;
        self
    }

    /// Apply test hooks from the environment:
    /// - `PTCAL_TEST_SIM_TIMEOUT=1` forces read timeouts.
    pub fn from_env(self) -> Self {
        let timeout = std::env::var("PTCAL_TEST_SIM_TIMEOUT")
            .map(|v| v == "1")
            .unwrap_or(false);
        self.with_forced_timeout(timeout)
    }

    pub fn pressure(&self) -> SimPressure {
        self.pressure.clone()
    }

    /// Voltage sensor `sensor` reports at `psi`.
    pub fn voltage(sensor: usize, psi: f64) -> f32 {
        let v = 0.5 + (0.004 + 0.0005 * sensor as f64) * psi;
        let q = (v * 1024.0).round() / 1024.0;
        q.clamp(0.5, 4095.0 / 1024.0) as f32
    }

    fn frame(&self) -> Vec<u8> {
        let psi = self.pressure.get();
        let mut out = Vec::with_capacity(self.sensor_count * 4 + self.terminator.len());
        for i in 0..self.sensor_count {
            out.extend_from_slice(&Self::voltage(i, psi).to_le_bytes());
        }
        out.extend_from_slice(&self.terminator);
        out
    }

    fn push_partial_frame(&mut self) {
        let frame = self.frame();
        let start = self.skew.min(frame.len());
        self.pending.extend(&frame[start..]);
    }
}

impl SerialLink for SimulatedLink {
    fn clear_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pending.clear();
        self.push_partial_frame();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        if self.force_timeout {
            return Ok(0);
        }
        if self.sensor_count == 0 && self.terminator.is_empty() {
            return Err(Box::new(HwError::Serial("simulated bank has no output".into())));
        }
        let want = buf.len().min(SIM_CHUNK);
        while self.pending.len() < want {
            let frame = self.frame();
            self.pending.extend(frame);
        }
        for slot in buf.iter_mut().take(want) {
            // pending holds at least `want` bytes
            *slot = self.pending.pop_front().unwrap_or_default();
        }
        tracing::trace!(n = want, "simulated read");
        Ok(want)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(link: &mut SimulatedLink, n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        while out.len() < n {
            let got = link.read(&mut buf[..(n - out.len()).min(64)]).unwrap();
            out.extend_from_slice(&buf[..got]);
        }
        out
    }

    #[test]
    fn stream_starts_mid_frame_then_aligns() {
        let mut link = SimulatedLink::new(2, b"\r\n");
        // 10-byte frames, first one is missing its first 3 bytes
        let bytes = drain(&mut link, 7 + 10);
        assert_eq!(&bytes[5..7], b"\r\n");
        assert_eq!(&bytes[15..17], b"\r\n");
    }

    #[test]
    fn voltages_track_pressure() {
        let pressure = SimPressure::new(0.0);
        let mut link = SimulatedLink::new(2, b"\r\n").with_pressure(pressure.clone());
        pressure.set(100.0);
        link.clear_input().unwrap();
        let bytes = drain(&mut link, 7 + 10);
        let frame = &bytes[7..17];
        let v0 = f32::from_le_bytes(frame[0..4].try_into().unwrap());
        let v1 = f32::from_le_bytes(frame[4..8].try_into().unwrap());
        assert_eq!(v0, SimulatedLink::voltage(0, 100.0));
        assert_eq!(v1, SimulatedLink::voltage(1, 100.0));
        assert!(v1 > v0);
    }

    #[test]
    fn reads_are_chunked() {
        let mut link = SimulatedLink::new(8, b"\r\n");
        let mut buf = [0u8; 64];
        assert_eq!(link.read(&mut buf).unwrap(), SIM_CHUNK);
    }

    #[test]
    fn forced_timeout_returns_no_data() {
        let mut link = SimulatedLink::new(2, b"\r\n").with_forced_timeout(true);
        let mut buf = [0u8; 8];
        assert_eq!(link.read(&mut buf).unwrap(), 0);
    }
}
