//! Builder for `SensorBank`.
//!
//! Frame layout and timing are validated once here; a built bank never
//! re-checks them.

use std::sync::{Arc, Mutex};

use ptcal_traits::SerialLink;
use ptcal_traits::clock::{Clock, MonotonicClock};

use crate::bank::SensorBank;
use crate::config::FrameCfg;
use crate::error::BuildError;
use crate::frame::FrameLayout;

/// Builder for `SensorBank`. All fields are validated on `build()`.
#[derive(Default)]
pub struct SensorBankBuilder {
    name: Option<String>,
    port: String,
    baud_rate: u32,
    layout: Option<FrameLayout>,
    frame_cfg: Option<FrameCfg>,
    link: Option<Box<dyn SerialLink + Send>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl SensorBank {
    /// Start building a bank.
    pub fn builder() -> SensorBankBuilder {
        SensorBankBuilder {
            baud_rate: 115_200,
            ..SensorBankBuilder::default()
        }
    }
}

impl SensorBankBuilder {
    /// Seed name, port, baud rate, layout and frame timing from configuration.
    pub fn from_config(cfg: &ptcal_config::Config, bank: &ptcal_config::BankCfg) -> Self {
        SensorBank::builder()
            .with_name(&bank.name)
            .with_port(&bank.port)
            .with_baud_rate(bank.effective_baud(&cfg.serial))
            .with_layout(bank.into())
            .with_frame_cfg((&cfg.acquisition).into())
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_port(mut self, port: &str) -> Self {
        self.port = port.to_string();
        self
    }

    pub fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    pub fn with_layout(mut self, layout: FrameLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_frame_cfg(mut self, cfg: FrameCfg) -> Self {
        self.frame_cfg = Some(cfg);
        self
    }

    pub fn with_link<L: SerialLink + Send + 'static>(mut self, link: L) -> Self {
        self.link = Some(Box::new(link));
        self
    }

    pub fn with_boxed_link(mut self, link: Box<dyn SerialLink + Send>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_clock<C: Clock + Send + Sync + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> eyre::Result<SensorBank> {
        let name = self
            .name
            .ok_or_else(|| eyre::Report::new(BuildError::MissingName))?;
        let id: String = name.split_whitespace().collect();
        if id.is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "bank name must not be blank",
            )));
        }
        let link = self
            .link
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLink))?;
        let layout = self.layout.ok_or_else(|| {
            eyre::Report::new(BuildError::InvalidConfig("frame layout is required"))
        })?;
        if layout.sensor_count == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensor_count must be > 0",
            )));
        }
        if layout.stop_sequence.is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "stop_sequence must not be empty",
            )));
        }
        let floats = layout.reading_bytes();
        if layout.payload_len != floats && layout.payload_len != floats + layout.stop_sequence.len()
        {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "payload length must cover the readings, optionally plus the stop sequence",
            )));
        }
        if self.baud_rate == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "baud_rate must be > 0",
            )));
        }
        let frame_cfg = self.frame_cfg.unwrap_or_default();
        if frame_cfg.max_idle_reads == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_idle_reads must be >= 1",
            )));
        }
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };

        tracing::debug!(bank = %id, port = %self.port, sensors = layout.sensor_count, "bank built");
        Ok(SensorBank {
            name,
            id,
            port: self.port,
            baud_rate: self.baud_rate,
            layout,
            frame_cfg,
            link: Mutex::new(link),
            clock,
        })
    }
}
