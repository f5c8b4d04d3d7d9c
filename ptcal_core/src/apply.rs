//! Test mode: apply stored coefficients to a fresh reading.

use tracing::info;

use crate::bank::SensorBank;
use crate::error::{CalError, Result};
use crate::regression::Coefficients;
use crate::store::CalibrationStore;

/// `slope_i * raw_i + intercept_i` for every sensor.
pub fn apply(raw: &[f32], coefficients: &[Coefficients]) -> Result<Vec<f64>> {
    if raw.len() != coefficients.len() {
        return Err(CalError::DimensionMismatch {
            readings: raw.len(),
            coefficients: coefficients.len(),
        });
    }
    Ok(raw
        .iter()
        .zip(coefficients)
        .map(|(&r, c)| c.apply(f64::from(r)))
        .collect())
}

/// One verification read of a bank.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub bank_id: String,
    pub raw: Vec<f32>,
    pub coefficients: Vec<Coefficients>,
    pub calibrated: Vec<f64>,
}

/// Load the latest coefficients, take one resynchronized frame and apply them.
///
/// The coefficients are read first so a missing or torn log fails before the
/// bank is touched.
pub fn run_test(bank: &SensorBank, store: &CalibrationStore) -> Result<TestReport> {
    let coefficients = store.read_latest_pair(bank.sensor_count())?;
    let raw = bank.read_decoded(true)?;
    let calibrated = apply(&raw, &coefficients)?;
    info!(bank = %bank.id(), sensors = raw.len(), "test reading calibrated");
    Ok(TestReport {
        bank_id: bank.id().to_string(),
        raw,
        coefficients,
        calibrated,
    })
}
