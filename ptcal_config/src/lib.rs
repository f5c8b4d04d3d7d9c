#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the PT calibration rig.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Each `[[banks]]` entry describes one serial-attached group of sensors.
//!   Frame layout values (stop sequence, payload length) live here so that
//!   nothing downstream hard-codes them.
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Largest bank the frame layout accepts.
pub const MAX_SENSORS_PER_BANK: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    /// Default baud rate for every bank (a bank may override it).
    pub baud_rate: u32,
    /// Per-read blocking timeout (ms).
    pub timeout_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AcquisitionCfg {
    /// Samples averaged per pressure set-point.
    pub readings_per_setpoint: usize,
    /// Frame attempts allowed for one accepted sample.
    pub max_attempts: u32,
    /// Backoff after failed attempt `k` is `k * backoff_step_ms`.
    pub backoff_step_ms: u64,
    /// Pause after flushing input, letting the sender refill its buffer.
    pub resync_delay_ms: u64,
    /// Consecutive empty reads tolerated before a read counts as timed out.
    pub max_idle_reads: u32,
}

impl Default for AcquisitionCfg {
    fn default() -> Self {
        Self {
            readings_per_setpoint: 10,
            max_attempts: 10,
            backoff_step_ms: 300,
            resync_delay_ms: 1_000,
            max_idle_reads: 3,
        }
    }
}

fn default_stop_sequence() -> String {
    "\r\n".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BankCfg {
    pub name: String,
    pub port: String,
    pub sensor_count: usize,
    /// Frame terminator; TOML escapes apply (default "\r\n").
    #[serde(default = "default_stop_sequence")]
    pub stop_sequence: String,
    /// Bytes per frame; defaults to `4 * sensor_count + len(stop_sequence)`.
    #[serde(default)]
    pub expected_payload_length: Option<usize>,
    /// Overrides `[serial].baud_rate` for this bank.
    #[serde(default)]
    pub baud_rate: Option<u32>,
}

impl BankCfg {
    /// Stable key: the name with all whitespace removed.
    pub fn id(&self) -> String {
        self.name.split_whitespace().collect()
    }

    pub fn stop_bytes(&self) -> Vec<u8> {
        self.stop_sequence.as_bytes().to_vec()
    }

    pub fn payload_len(&self) -> usize {
        self.expected_payload_length
            .unwrap_or(self.sensor_count * 4 + self.stop_sequence.len())
    }

    pub fn effective_baud(&self, serial: &SerialCfg) -> u32 {
        self.baud_rate.unwrap_or(serial.baud_rate)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogsCfg {
    /// Directory holding raw, average and calibration logs.
    pub dir: PathBuf,
}

impl Default for LogsCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl LogsCfg {
    pub fn raw_path(&self, bank_id: &str) -> PathBuf {
        self.dir.join(format!("raw_readings_{bank_id}.csv"))
    }

    pub fn avg_path(&self, bank_id: &str) -> PathBuf {
        self.dir.join(format!("avg_readings_{bank_id}.csv"))
    }

    pub fn cal_path(&self, bank_id: &str) -> PathBuf {
        self.dir.join(format!("cals_{bank_id}.csv"))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialCfg,
    #[serde(default)]
    pub acquisition: AcquisitionCfg,
    pub banks: Vec<BankCfg>,
    #[serde(default)]
    pub logs: LogsCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file (no validation).
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))
}

impl Config {
    /// Look up a bank by id or by display name.
    pub fn bank(&self, key: &str) -> Option<&BankCfg> {
        self.banks.iter().find(|b| b.id() == key || b.name == key)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.baud_rate == 0 {
            eyre::bail!("serial.baud_rate must be > 0");
        }
        if self.serial.timeout_ms == 0 {
            eyre::bail!("serial.timeout_ms must be >= 1");
        }

        // Acquisition
        let acq = &self.acquisition;
        if acq.readings_per_setpoint == 0 {
            eyre::bail!("acquisition.readings_per_setpoint must be >= 1");
        }
        if acq.max_attempts == 0 {
            eyre::bail!("acquisition.max_attempts must be >= 1");
        }
        if acq.max_idle_reads == 0 {
            eyre::bail!("acquisition.max_idle_reads must be >= 1");
        }
        if acq.resync_delay_ms > 60_000 {
            eyre::bail!("acquisition.resync_delay_ms is unreasonably large (>60s)");
        }
        if acq.backoff_step_ms > 10_000 {
            eyre::bail!("acquisition.backoff_step_ms is unreasonably large (>10s)");
        }

        // Banks
        if self.banks.is_empty() {
            eyre::bail!("at least one [[banks]] entry is required");
        }
        let mut seen: Vec<String> = Vec::with_capacity(self.banks.len());
        for bank in &self.banks {
            let id = bank.id();
            if id.is_empty() {
                eyre::bail!("banks.name must not be blank");
            }
            if seen.contains(&id) {
                eyre::bail!("banks.name '{}' is not unique (id '{id}')", bank.name);
            }
            seen.push(id);
            if bank.port.trim().is_empty() {
                eyre::bail!("banks.port for '{}' must not be empty", bank.name);
            }
            if bank.sensor_count == 0 || bank.sensor_count > MAX_SENSORS_PER_BANK {
                eyre::bail!(
                    "banks.sensor_count for '{}' must be in 1..={MAX_SENSORS_PER_BANK}",
                    bank.name
                );
            }
            if bank.stop_sequence.is_empty() {
                eyre::bail!("banks.stop_sequence for '{}' must not be empty", bank.name);
            }
            let floats = bank.sensor_count * 4;
            let len = bank.payload_len();
            if len != floats && len != floats + bank.stop_sequence.len() {
                eyre::bail!(
                    "banks.expected_payload_length for '{}' must be {} or {} (got {len})",
                    bank.name,
                    floats,
                    floats + bank.stop_sequence.len()
                );
            }
            if bank.baud_rate == Some(0) {
                eyre::bail!("banks.baud_rate for '{}' must be > 0", bank.name);
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
