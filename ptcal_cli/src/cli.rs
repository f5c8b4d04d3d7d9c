//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "ptcal", version, about = "Pressure transducer bank calibration")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/ptcal.toml")]
    pub config: PathBuf,

    /// Emit JSON lines on stdout instead of tables
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire set-points on every bank, then fit and store coefficients
    Calibrate {
        /// Reference pressure for one set-point (repeatable). Without any,
        /// pressures are read from stdin until `fit`.
        #[arg(long = "pressure", value_name = "PSI")]
        pressures: Vec<f64>,
        /// Acquire and log set-points but do not fit or store coefficients
        #[arg(long, action = ArgAction::SetTrue)]
        no_fit: bool,
    },
    /// Apply the latest stored coefficients to fresh readings
    Test {
        /// Bank id or name; all banks when omitted
        #[arg(long)]
        bank: Option<String>,
        /// Number of readings per bank
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Pressure applied to simulated banks
        #[arg(long, value_name = "PSI", default_value_t = 0.0)]
        sim_pressure: f64,
    },
    /// Print the latest stored coefficients
    Show {
        /// Bank id or name; all banks when omitted
        #[arg(long)]
        bank: Option<String>,
    },
    /// Fit a bank again from its average log
    Refit {
        /// Bank id or name
        #[arg(long)]
        bank: String,
        /// Average log to read (default: the bank's log under [logs].dir)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Append the refitted coefficients to the calibration log
        #[arg(long, action = ArgAction::SetTrue)]
        save: bool,
    },
    /// List serial ports visible to this host
    Ports,
    /// Open every bank and read one frame
    SelfCheck,
}
