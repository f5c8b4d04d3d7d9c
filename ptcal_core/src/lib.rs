#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pressure-transducer calibration pipeline (hardware-agnostic).
//!
//! Every byte comes from a `ptcal_traits::SerialLink`; the crate never opens a
//! port itself.
//!
//! ## Architecture
//!
//! - **Frames**: fixed-length little-endian f32 payloads followed by a stop
//!   sequence (`frame` module), read under a per-bank lock (`bank` module)
//! - **Averaging**: bounded-retry sampling and per-set-point means (`averager`)
//! - **Regression**: ordinary least squares per sensor (`regression`)
//! - **Persistence**: append-only coefficient log with tail-scan recovery
//!   (`store`), plus raw and average data logs (`datalog`)
//! - **Test mode**: stored coefficients applied to a fresh frame (`apply`)
//! - **Session**: all banks acquired concurrently with progress events
//!   (`session`)
//!
//! ## Regression convention
//!
//! x is the averaged raw reading and y the reference pressure, so
//! `pressure = slope * reading + intercept`.

pub mod apply;
pub mod averager;
pub mod bank;
pub mod builder;
pub mod config;
pub mod conversions;
pub mod datalog;
pub mod error;
pub mod frame;
pub mod hw_error;
pub mod mocks;
pub mod regression;
pub mod session;
pub mod store;
pub mod util;

pub use apply::{TestReport, apply, run_test};
pub use averager::{CalibrationHistory, ReadingSet, SampleAverager, SetPoint};
pub use bank::SensorBank;
pub use builder::SensorBankBuilder;
pub use config::{AcquisitionCfg, FrameCfg};
pub use datalog::{DataLog, FileDataLog, NullDataLog, read_average_log};
pub use error::{BuildError, CalError, DecodeError, InsufficientReason, Report, Result};
pub use frame::{FrameLayout, decode, encode};
pub use regression::{Coefficients, fit, fit_all, fit_all_and_store};
pub use session::{BankRig, CalibrationSession, Progress};
pub use store::{CalibrationStore, RowLabel};
