//! Small numeric and time helpers shared across the pipeline.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch; 0 if the system clock is before 1970.
#[inline]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Round `x` to `decimals` places, ties to even on the scaled value.
///
/// Values whose scaled magnitude exceeds 2^53 are already integral at that
/// precision and come back unchanged; non-finite input passes through.
#[inline]
pub fn round_decimals(x: f64, decimals: i32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let factor = 10f64.powi(decimals);
    let scaled = x * factor;
    if !scaled.is_finite() || scaled.abs() >= 9_007_199_254_740_992.0 {
        return x;
    }
    scaled.round_ties_even() / factor
}

/// Arithmetic mean; `None` for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_decimals(0.125, 2), 0.12);
        assert_eq!(round_decimals(0.375, 2), 0.38);
        assert_eq!(round_decimals(2.5, 0), 2.0);
        assert_eq!(round_decimals(-1.23456789, 5), -1.23457);
    }

    #[test]
    fn huge_values_pass_through() {
        assert_eq!(round_decimals(1.0e300, 15), 1.0e300);
        assert!(round_decimals(f64::NAN, 5).is_nan());
    }

    #[test]
    fn mean_of_values() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0, 6.0]), Some(3.0));
    }
}
