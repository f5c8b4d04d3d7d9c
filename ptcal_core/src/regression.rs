//! Least-squares line fit per sensor.
//!
//! Inputs follow the history convention: x is the average reading, y is the
//! reference pressure, so `slope * raw + intercept` yields pressure.

use tracing::info;

use crate::averager::CalibrationHistory;
use crate::error::{CalError, InsufficientReason, Result};
use crate::store::CalibrationStore;
use crate::util::round_decimals;

/// Decimal places kept on the slope.
pub const SLOPE_DECIMALS: i32 = 15;
/// Decimal places kept on the intercept.
pub const INTERCEPT_DECIMALS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub slope: f64,
    pub intercept: f64,
}

impl Coefficients {
    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        self.slope * raw + self.intercept
    }
}

/// Ordinary least squares over paired samples, rounded for storage.
pub fn fit(x: &[f64], y: &[f64]) -> std::result::Result<Coefficients, InsufficientReason> {
    if x.len() != y.len() {
        return Err(InsufficientReason::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    let n = x.len();
    if n == 0 {
        return Err(InsufficientReason::Empty);
    }
    if n < 2 {
        return Err(InsufficientReason::TooFewPoints(n));
    }

    let nf = n as f64;
    let mx = x.iter().sum::<f64>() / nf;
    let my = y.iter().sum::<f64>() / nf;
    let (sxx, sxy) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxx, sxy), (&xi, &yi)| {
            let dx = xi - mx;
            (sxx + dx * dx, sxy + dx * (yi - my))
        });
    if sxx == 0.0 {
        return Err(InsufficientReason::DegenerateX);
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    Ok(Coefficients {
        slope: round_decimals(slope, SLOPE_DECIMALS),
        intercept: round_decimals(intercept, INTERCEPT_DECIMALS),
    })
}

/// Fit every sensor in index order. The first failing sensor aborts the fit.
pub fn fit_all(history: &CalibrationHistory) -> Result<Vec<Coefficients>> {
    (0..history.sensor_count())
        .map(|sensor| {
            let (x, y) = history.xy(sensor);
            fit(&x, &y).map_err(|reason| CalError::InsufficientData { sensor, reason })
        })
        .collect()
}

/// Fit every sensor and persist the slope and intercept rows.
pub fn fit_all_and_store(
    history: &CalibrationHistory,
    store: &CalibrationStore,
) -> Result<Vec<Coefficients>> {
    let coeffs = fit_all(history)?;
    let ts = store.append_coefficients(&coeffs)?;
    info!(
        path = %store.path().display(),
        sensors = coeffs.len(),
        setpoints = history.setpoints(),
        ts,
        "calibration stored"
    );
    Ok(coeffs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn three_point_fit() {
        let c = fit(&[0.1, 1.1, 2.0], &[0.0, 10.0, 20.0]).unwrap();
        assert!((c.slope - 10.516_605_166_051_66).abs() < 1e-12, "{c:?}");
        assert_eq!(c.intercept, -1.21771);
    }

    #[test]
    fn exact_line_is_recovered() {
        let x = [0.5, 1.0, 1.5, 2.0];
        let y: Vec<f64> = x.iter().map(|v| 250.0 * v - 125.0).collect();
        let c = fit(&x, &y).unwrap();
        assert_eq!(c.slope, 250.0);
        assert_eq!(c.intercept, -125.0);
        assert_eq!(c.apply(1.25), 187.5);
    }

    #[rstest]
    #[case(&[1.0, 2.0], &[1.0], InsufficientReason::LengthMismatch { x: 2, y: 1 })]
    #[case(&[], &[], InsufficientReason::Empty)]
    #[case(&[1.0], &[3.0], InsufficientReason::TooFewPoints(1))]
    #[case(&[0.7, 0.7, 0.7], &[0.0, 10.0, 20.0], InsufficientReason::DegenerateX)]
    fn failure_reasons_are_distinct(
        #[case] x: &[f64],
        #[case] y: &[f64],
        #[case] reason: InsufficientReason,
    ) {
        assert_eq!(fit(x, y), Err(reason));
    }

    #[test]
    fn fit_all_names_the_failing_sensor() {
        let mut h = CalibrationHistory::new(2);
        h.push(0.0, &[0.5, 0.9]).unwrap();
        h.push(100.0, &[1.5, 0.9]).unwrap();
        assert_eq!(
            fit_all(&h),
            Err(CalError::InsufficientData {
                sensor: 1,
                reason: InsufficientReason::DegenerateX
            })
        );
    }
}
