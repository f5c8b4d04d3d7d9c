//! Maps `Box<dyn Error>` from the `SerialLink` boundary to typed `CalError`.
//!
//! `ptcal_traits::SerialLink` returns boxed errors so the core does not depend
//! on a serial backend; this module converts them back, with an optional
//! feature-gated path for `ptcal_hardware::HwError` downcasting.

use crate::error::CalError;

/// Map a link-boundary error to a typed `CalError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> CalError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<ptcal_hardware::error::HwError>() {
            return match hw {
                ptcal_hardware::error::HwError::Timeout => CalError::Timeout,
                other => CalError::Transport(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>()
        && io.kind() == std::io::ErrorKind::TimedOut
    {
        return CalError::Timeout;
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        CalError::Timeout
    } else {
        CalError::Transport(s)
    }
}
