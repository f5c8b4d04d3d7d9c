//! A sensor bank and its frame-read primitive.
//!
//! `SensorBank` owns the serial link of one physical group of sensors behind a
//! mutex. Every read of the bank (acquisition, resync, test-mode single reads)
//! goes through that lock, so two threads never interleave bytes from the
//! same port. Distinct banks hold distinct locks and can be read in parallel.

use std::sync::{Arc, Mutex};

use ptcal_traits::SerialLink;
use ptcal_traits::clock::Clock;
use tracing::{debug, trace, warn};

use crate::config::FrameCfg;
use crate::error::{CalError, Result};
use crate::frame::{FrameLayout, decode};
use crate::hw_error::map_link_error;

pub struct SensorBank {
    pub(crate) name: String,
    pub(crate) id: String,
    pub(crate) port: String,
    pub(crate) baud_rate: u32,
    pub(crate) layout: FrameLayout,
    pub(crate) frame_cfg: FrameCfg,
    pub(crate) link: Mutex<Box<dyn SerialLink + Send>>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for SensorBank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SensorBank")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("baud_rate", &self.baud_rate)
            .field("layout", &self.layout)
            .finish()
    }
}

impl SensorBank {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with whitespace removed; stable key for files and events.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn sensor_count(&self) -> usize {
        self.layout.sensor_count
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn clock(&self) -> &(dyn Clock + Send + Sync) {
        self.clock.as_ref()
    }

    /// Read exactly one frame's worth of bytes (`layout.payload_len`).
    ///
    /// With `resync`, buffered input is discarded first, the bank waits
    /// `resync_delay` for the sender to refill, and bytes are consumed up to
    /// and including the next stop sequence so the returned bytes start on a
    /// frame boundary.
    pub fn read_frame(&self, resync: bool) -> Result<Vec<u8>> {
        let mut link = self
            .link
            .lock()
            .map_err(|_| CalError::Transport(format!("{}: serial link lock poisoned", self.id)))?;
        if resync {
            self.resync(&mut **link)?;
        }
        let frame = self.read_exact(&mut **link, self.layout.payload_len)?;
        trace!(bank = %self.id, len = frame.len(), "frame read");
        Ok(frame)
    }

    /// Read one frame and decode it into per-sensor readings.
    pub fn read_decoded(&self, resync: bool) -> Result<Vec<f32>> {
        let frame = self.read_frame(resync)?;
        Ok(decode(&frame, &self.layout)?)
    }

    fn resync<L: SerialLink + ?Sized>(&self, link: &mut L) -> Result<()> {
        link.clear_input()
            .map_err(|e| map_link_error(e.as_ref()))?;
        self.clock.sleep(self.frame_cfg.resync_delay);

        let stop = self.layout.stop_sequence.as_slice();
        if stop.is_empty() {
            return Ok(());
        }
        // A terminator must show up within a few frames of arbitrary noise.
        let limit = self.layout.payload_len.saturating_mul(4).max(stop.len());
        let mut window: Vec<u8> = Vec::with_capacity(stop.len());
        let mut byte = [0u8; 1];
        let mut consumed = 0usize;
        let mut idle = 0u32;
        while consumed < limit {
            let n = link.read(&mut byte).map_err(|e| map_link_error(e.as_ref()))?;
            if n == 0 {
                idle += 1;
                if idle >= self.frame_cfg.max_idle_reads {
                    warn!(bank = %self.id, consumed, "no data while resynchronizing");
                    return Err(CalError::Timeout);
                }
                continue;
            }
            idle = 0;
            consumed += 1;
            if window.len() == stop.len() {
                window.remove(0);
            }
            window.push(byte[0]);
            if window == stop {
                debug!(bank = %self.id, discarded = consumed, "resynchronized on stop sequence");
                return Ok(());
            }
        }
        Err(CalError::Transport(format!(
            "{}: stop sequence not found within {limit} bytes",
            self.id
        )))
    }

    fn read_exact<L: SerialLink + ?Sized>(&self, link: &mut L, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let mut filled = 0usize;
        let mut idle = 0u32;
        while filled < len {
            let n = link
                .read(&mut buf[filled..])
                .map_err(|e| map_link_error(e.as_ref()))?;
            if n == 0 {
                idle += 1;
                if idle >= self.frame_cfg.max_idle_reads {
                    warn!(bank = %self.id, filled, len, "serial read timed out mid-frame");
                    return Err(CalError::Timeout);
                }
                continue;
            }
            idle = 0;
            filled += n.min(len - filled);
        }
        Ok(buf)
    }
}
