//! Human-readable error descriptions and structured JSON error formatting.

use ptcal_core::error::{BuildError, CalError, InsufficientReason};
use ptcal_hardware::error::HwError;

use crate::calibrate::Interrupted;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingLink => {
                "What happened: No serial link was provided for a bank.\nLikely causes: The port failed to open or was not wired into the builder.\nHow to fix: Check [[banks]].port, then pass the link via with_link(...).".to_string()
            }
            BuildError::MissingName => {
                "What happened: A bank has no name.\nLikely causes: The [[banks]] entry omits `name`.\nHow to fix: Give every bank a unique, non-blank name.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid bank configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the [[banks]] entries in the config, then rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CalError>() {
        return match ce {
            CalError::Timeout => "What happened: Serial read timed out.\nLikely causes: Bank unplugged or unpowered, wrong port, or timeout too low.\nHow to fix: Check the cable and [[banks]].port, and consider raising serial.timeout_ms.".to_string(),
            CalError::Transport(msg) => format!(
                "What happened: Serial transport failed ({msg}).\nLikely causes: Device disconnected or the port is held by another process.\nHow to fix: Reconnect the bank and close other programs using the port."
            ),
            CalError::Decode(e) => format!(
                "What happened: A frame could not be decoded ({e}).\nLikely causes: sensor_count, stop_sequence or expected_payload_length does not match the firmware.\nHow to fix: Compare the [[banks]] frame settings with what the bank actually sends."
            ),
            CalError::AcquisitionExhausted { attempts, last } => format!(
                "What happened: No valid frame after {attempts} attempts (last error: {last}).\nLikely causes: Bank not streaming, wrong baud rate, or a noisy line.\nHow to fix: Run `self-check`, verify baud_rate, and raise acquisition.max_attempts if the link is merely slow."
            ),
            CalError::IncompleteSample { sensor, expected, actual } => format!(
                "What happened: Sensor {sensor} has {actual} of {expected} readings.\nLikely causes: Acquisition was cut short.\nHow to fix: Repeat the set-point."
            ),
            CalError::InsufficientData { sensor, reason } => {
                let hint = match reason {
                    InsufficientReason::DegenerateX => "Every set-point produced the same reading; the sensor may be dead or the pressure never changed.",
                    InsufficientReason::TooFewPoints(_) | InsufficientReason::Empty => "Fewer than two set-points were recorded.",
                    InsufficientReason::LengthMismatch { .. } => "The average log rows have inconsistent widths.",
                };
                format!(
                    "What happened: Cannot fit sensor {sensor}: {reason}.\nLikely causes: {hint}\nHow to fix: Acquire at least two distinct pressures, then fit again."
                )
            }
            CalError::CorruptCalibration(msg) => format!(
                "What happened: The calibration log is unusable ({msg}).\nLikely causes: The bank was never calibrated, or a write was interrupted.\nHow to fix: Run `calibrate`, or `refit --save` from the average log."
            ),
            CalError::DimensionMismatch { readings, coefficients } => format!(
                "What happened: {readings} readings but {coefficients} stored coefficients.\nLikely causes: sensor_count changed since the last calibration.\nHow to fix: Recalibrate the bank with its current layout."
            ),
            CalError::UnknownBank(id) => format!(
                "What happened: No bank named '{id}'.\nLikely causes: Typo, or the bank is missing from the config.\nHow to fix: Use a bank name or id listed under [[banks]]."
            ),
            CalError::Io(msg) => format!(
                "What happened: File access failed ({msg}).\nLikely causes: Missing directory or insufficient permissions.\nHow to fix: Check [logs].dir and its permissions."
            ),
        };
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return match hw {
            HwError::PortNotFound(p) => format!(
                "What happened: Serial port {p} was not found.\nLikely causes: Device unplugged or wrong path.\nHow to fix: Run `ports` to list what this host sees, then update [[banks]].port."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: Serial driver or permission problem.\nHow to fix: Check the device and that this user may open it (e.g. the dialout group)."
            ),
        };
    }

    if err.downcast_ref::<Interrupted>().is_some() {
        return "What happened: Calibration was interrupted.\nLikely causes: Ctrl-C between set-points.\nHow to fix: Set-points already acquired are in the average log; run `refit --save` to fit them.".to_string();
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open serial port") {
        return format!(
            "What happened: Failed to open a serial port.\nLikely causes: Wrong path or the port is busy.\nHow to fix: Check [[banks]].port against `ports`. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") || lower.contains("read config") {
        let cause = err
            .chain()
            .skip(1)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ");
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: {}\nHow to fix: Edit the TOML config and try again.",
            if cause.is_empty() { msg.clone() } else { cause }
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn cal_error(err: &eyre::Report) -> Option<&CalError> {
    err.chain().find_map(|e| e.downcast_ref::<CalError>())
}

/// Stable exit codes per failure class; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match cal_error(err) {
        Some(CalError::Timeout | CalError::Transport(_)) => 3,
        Some(CalError::AcquisitionExhausted { .. }) => 4,
        Some(CalError::CorruptCalibration(_)) => 5,
        Some(CalError::InsufficientData { .. }) => 6,
        _ => {
            if err.downcast_ref::<Interrupted>().is_some() {
                130
            } else {
                1
            }
        }
    }
}

pub fn reason_name(err: &eyre::Report) -> &'static str {
    match cal_error(err) {
        Some(CalError::Transport(_)) => "Transport",
        Some(CalError::Timeout) => "Timeout",
        Some(CalError::Decode(_)) => "Decode",
        Some(CalError::AcquisitionExhausted { .. }) => "AcquisitionExhausted",
        Some(CalError::IncompleteSample { .. }) => "IncompleteSample",
        Some(CalError::InsufficientData { .. }) => "InsufficientData",
        Some(CalError::CorruptCalibration(_)) => "CorruptCalibration",
        Some(CalError::DimensionMismatch { .. }) => "DimensionMismatch",
        Some(CalError::UnknownBank(_)) => "UnknownBank",
        Some(CalError::Io(_)) => "Io",
        None if err.downcast_ref::<BuildError>().is_some() => "InvalidConfig",
        None if err.downcast_ref::<Interrupted>().is_some() => "Interrupted",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match cal_error(err) {
        Some(CalError::AcquisitionExhausted { attempts, last }) => {
            Some(json!({ "attempts": attempts, "last": last }))
        }
        Some(CalError::InsufficientData { sensor, reason }) => {
            Some(json!({ "sensor": sensor, "reason": reason.to_string() }))
        }
        Some(CalError::DimensionMismatch {
            readings,
            coefficients,
        }) => Some(json!({ "readings": readings, "coefficients": coefficients })),
        _ => None,
    };

    let obj = if let Some(d) = details {
        json!({ "reason": reason_name(err), "details": d, "message": humanize(err) })
    } else {
        json!({ "reason": reason_name(err), "message": humanize(err) })
    };
    obj.to_string()
}
