//! `From` implementations bridging `ptcal_config` types to `ptcal_core` types.

use std::time::Duration;

use crate::config::{AcquisitionCfg, FrameCfg};
use crate::frame::FrameLayout;

// ── AcquisitionCfg ───────────────────────────────────────────────────────────

impl From<&ptcal_config::AcquisitionCfg> for AcquisitionCfg {
    fn from(c: &ptcal_config::AcquisitionCfg) -> Self {
        Self {
            readings_per_setpoint: c.readings_per_setpoint,
            max_attempts: c.max_attempts,
            backoff_step: Duration::from_millis(c.backoff_step_ms),
        }
    }
}

// ── FrameCfg ─────────────────────────────────────────────────────────────────

impl From<&ptcal_config::AcquisitionCfg> for FrameCfg {
    fn from(c: &ptcal_config::AcquisitionCfg) -> Self {
        Self {
            resync_delay: Duration::from_millis(c.resync_delay_ms),
            max_idle_reads: c.max_idle_reads,
        }
    }
}

// ── FrameLayout ──────────────────────────────────────────────────────────────

impl From<&ptcal_config::BankCfg> for FrameLayout {
    fn from(c: &ptcal_config::BankCfg) -> Self {
        Self {
            sensor_count: c.sensor_count,
            stop_sequence: c.stop_bytes(),
            payload_len: c.payload_len(),
        }
    }
}
