//! Runtime configuration for the acquisition pipeline.
//!
//! These are the structs the core consumes. They are separate from the
//! TOML-deserialized schema in `ptcal_config`; see `conversions` for the
//! mapping.

use std::time::Duration;

/// Frame-level timing and tolerance for one bank's link.
#[derive(Debug, Clone)]
pub struct FrameCfg {
    /// Pause after flushing input so the sender can refill its buffer.
    pub resync_delay: Duration,
    /// Consecutive empty reads tolerated before reporting a timeout.
    pub max_idle_reads: u32,
}

impl Default for FrameCfg {
    fn default() -> Self {
        Self {
            resync_delay: Duration::from_secs(1),
            max_idle_reads: 3,
        }
    }
}

/// Sampling policy for one set-point.
#[derive(Debug, Clone)]
pub struct AcquisitionCfg {
    /// Samples averaged per set-point.
    pub readings_per_setpoint: usize,
    /// Frame attempts allowed per accepted sample.
    pub max_attempts: u32,
    /// Backoff after failed attempt `k` is `k * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            readings_per_setpoint: 10,
            max_attempts: 10,
            backoff_step: Duration::from_millis(300),
        }
    }
}

impl AcquisitionCfg {
    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    #[inline]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}
