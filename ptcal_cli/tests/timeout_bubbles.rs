use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = format!(
        r#"
[acquisition]
readings_per_setpoint = 2
max_attempts = 2
backoff_step_ms = 0
resync_delay_ms = 0
max_idle_reads = 2

[[banks]]
name = "PT1"
port = "sim"
sensor_count = 2

[logs]
dir = "{}"
"#,
        dir.path().join("logs").display().to_string().replace('\\', "/")
    );
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();
    cfg
}

#[rstest]
fn sim_timeout_exhausts_acquisition() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);

    let mut cmd = Command::cargo_bin("ptcal_cli").unwrap();
    cmd.env("PTCAL_TEST_SIM_TIMEOUT", "1");
    cmd.arg("--config")
        .arg(&cfg)
        .arg("calibrate")
        .arg("--pressure")
        .arg("10");
    cmd.assert().code(4).stderr(predicate::str::contains(
        "What happened: No valid frame after 2 attempts",
    ));
}

#[rstest]
fn sim_timeout_bubbles_from_self_check() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);

    let mut cmd = Command::cargo_bin("ptcal_cli").unwrap();
    cmd.env("PTCAL_TEST_SIM_TIMEOUT", "1");
    cmd.arg("--config").arg(&cfg).arg("self-check");
    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("What happened: Serial read timed out"));
}

#[rstest]
fn timeout_as_json_error() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);

    let mut cmd = Command::cargo_bin("ptcal_cli").unwrap();
    cmd.env("PTCAL_TEST_SIM_TIMEOUT", "1");
    cmd.arg("--json")
        .arg("--config")
        .arg(&cfg)
        .arg("calibrate")
        .arg("--pressure")
        .arg("10");
    let out = cmd.assert().code(4).get_output().stdout.clone();
    let stdout = String::from_utf8_lossy(&out);
    let line = stdout
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or_default();
    let v: serde_json::Value = serde_json::from_str(line).expect("valid JSON");
    assert_eq!(v["reason"], "AcquisitionExhausted");
    assert_eq!(v["details"]["attempts"], 2);
}
