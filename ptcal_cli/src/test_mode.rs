//! `test`, `show`, `refit` and `self-check`: everything that reads back.

use std::path::PathBuf;

use ptcal_config::{BankCfg, Config};
use ptcal_core::{
    CalError, CalibrationSession, CalibrationStore, TestReport, fit_all, fit_all_and_store,
    read_average_log,
};
use ptcal_hardware::SimPressure;
use serde_json::json;

use crate::calibrate::print_coefficients;
use crate::cli::json_mode;
use crate::links::open_link;

fn select<'a>(cfg: &'a Config, bank: Option<&str>) -> eyre::Result<Vec<&'a BankCfg>> {
    match bank {
        Some(key) => cfg
            .bank(key)
            .map(|b| vec![b])
            .ok_or_else(|| eyre::Report::new(CalError::UnknownBank(key.to_string()))),
        None => Ok(cfg.banks.iter().collect()),
    }
}

fn print_report(report: &TestReport) {
    if json_mode() {
        println!(
            "{}",
            json!({
                "event": "test",
                "bank": report.bank_id,
                "raw": report.raw,
                "calibrated": report.calibrated,
            })
        );
        return;
    }
    println!("{} calibrated:", report.bank_id);
    for (i, (raw, value)) in report.raw.iter().zip(&report.calibrated).enumerate() {
        println!("  pt{i}: {value:.3} psi (raw {raw:.4} V)");
    }
}

pub fn run_test(cfg: &Config, bank: Option<&str>, count: u32, sim_pressure: f64) -> eyre::Result<()> {
    let selected = select(cfg, bank)?;
    let sim = SimPressure::new(sim_pressure);
    let session =
        CalibrationSession::from_config_banks(cfg, &selected, false, |b| open_link(cfg, b, &sim))?;
    for b in selected {
        let id = b.id();
        for _ in 0..count.max(1) {
            let report = session.apply_test(&id)?;
            print_report(&report);
        }
    }
    Ok(())
}

pub fn run_show(cfg: &Config, bank: Option<&str>) -> eyre::Result<()> {
    for b in select(cfg, bank)? {
        let id = b.id();
        let store = CalibrationStore::reader(cfg.logs.cal_path(&id));
        let coeffs = store.read_latest_pair(b.sensor_count)?;
        print_coefficients(&id, &coeffs, "stored");
    }
    Ok(())
}

pub fn run_refit(cfg: &Config, bank: &str, input: Option<PathBuf>, save: bool) -> eyre::Result<()> {
    let b = cfg
        .bank(bank)
        .ok_or_else(|| eyre::Report::new(CalError::UnknownBank(bank.to_string())))?;
    let id = b.id();
    let path = input.unwrap_or_else(|| cfg.logs.avg_path(&id));
    let history = read_average_log(&path, b.sensor_count)?;
    tracing::info!(bank = %id, path = %path.display(), setpoints = history.setpoints(), "refitting");
    let coeffs = if save {
        let store = CalibrationStore::open(cfg.logs.cal_path(&id))?;
        fit_all_and_store(&history, &store)?
    } else {
        fit_all(&history)?
    };
    print_coefficients(&id, &coeffs, if save { "calibration" } else { "refit" });
    Ok(())
}

pub fn run_self_check(cfg: &Config) -> eyre::Result<()> {
    let sim = SimPressure::new(0.0);
    let session = CalibrationSession::from_config(cfg, false, |b| open_link(cfg, b, &sim))?;
    for rig in session.rigs() {
        let bank = rig.bank();
        let readings = bank.read_decoded(true)?;
        if json_mode() {
            println!(
                "{}",
                json!({ "event": "self_check", "bank": bank.id(), "port": bank.port(), "readings": readings })
            );
        } else {
            println!("{} on {}: OK ({} sensors)", bank.id(), bank.port(), readings.len());
        }
    }
    Ok(())
}
