//! `calibrate`: set-point loop across every bank, then fit and store.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ptcal_core::{CalibrationSession, Coefficients, Progress};
use ptcal_hardware::SimPressure;
use serde_json::json;

use crate::cli::json_mode;
use crate::links::open_link;

/// Operator asked to stop between set-points.
#[derive(Debug)]
pub struct Interrupted;

impl std::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("calibration interrupted")
    }
}

impl std::error::Error for Interrupted {}

enum Next {
    Pressure(f64),
    Fit,
}

fn prompt_pressure(input: &mut impl BufRead) -> eyre::Result<Next> {
    loop {
        eprint!("reference pressure (psi), or 'fit' to finish: ");
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Next::Fit);
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("fit") || line.eq_ignore_ascii_case("done") {
            return Ok(Next::Fit);
        }
        match line.parse::<f64>() {
            Ok(p) if p.is_finite() => return Ok(Next::Pressure(p)),
            _ => eprintln!("not a pressure: {line:?}"),
        }
    }
}

fn print_progress(ev: &Progress) {
    if json_mode() {
        let obj = match ev {
            Progress::Sample {
                bank_id,
                taken,
                total,
            } => json!({ "event": "sample", "bank": bank_id, "taken": taken, "total": total }),
            Progress::Averaged {
                bank_id,
                means,
                elapsed_ms,
            } => {
                json!({ "event": "average", "bank": bank_id, "means": means, "elapsed_ms": elapsed_ms })
            }
            Progress::Failed { bank_id, error } => {
                json!({ "event": "failed", "bank": bank_id, "error": error.to_string() })
            }
        };
        println!("{obj}");
        return;
    }
    match ev {
        Progress::Sample {
            bank_id,
            taken,
            total,
        } => eprint!("\r{bank_id}: {taken}/{total}   "),
        Progress::Averaged {
            bank_id,
            means,
            elapsed_ms,
        } => {
            let cols: Vec<String> = means.iter().map(|m| format!("{m:.4}")).collect();
            eprintln!();
            println!("{bank_id} averages: {}", cols.join(", "));
            tracing::debug!(bank = %bank_id, elapsed_ms, "set-point averaged");
        }
        Progress::Failed { bank_id, error } => {
            eprintln!();
            eprintln!("{bank_id} failed: {error}");
        }
    }
}

pub fn print_coefficients(bank_id: &str, coeffs: &[Coefficients], event: &str) {
    if json_mode() {
        let list: Vec<_> = coeffs
            .iter()
            .map(|c| json!({ "slope": c.slope, "intercept": c.intercept }))
            .collect();
        println!("{}", json!({ "event": event, "bank": bank_id, "coefficients": list }));
        return;
    }
    println!("{bank_id} {event}:");
    for (i, c) in coeffs.iter().enumerate() {
        println!("  pt{i}: slope={} intercept={}", c.slope, c.intercept);
    }
}

pub fn run_calibrate(
    cfg: &ptcal_config::Config,
    pressures: &[f64],
    no_fit: bool,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    let sim = SimPressure::new(0.0);
    let mut session = CalibrationSession::from_config(cfg, true, |b| open_link(cfg, b, &sim))?;
    tracing::info!(banks = cfg.banks.len(), "calibration session started");

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut scripted = pressures.iter().copied();
    let mut setpoints = 0usize;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Err(eyre::Report::new(Interrupted));
        }
        let next = if pressures.is_empty() {
            prompt_pressure(&mut input)?
        } else {
            scripted.next().map_or(Next::Fit, Next::Pressure)
        };
        let Next::Pressure(psi) = next else {
            break;
        };
        sim.set(psi);
        session.acquire_setpoint(psi, |ev| print_progress(&ev))?;
        setpoints += 1;
    }

    if no_fit {
        tracing::info!(setpoints, "set-points logged; fit skipped");
        return Ok(());
    }
    for (bank_id, coeffs) in session.run_all_regressions()? {
        print_coefficients(&bank_id, &coeffs, "calibration");
    }
    Ok(())
}
