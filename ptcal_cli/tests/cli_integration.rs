use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use assert_cmd::Command;
use tempfile::tempdir;

// Minimal sim config: no resync pause, no backoff, logs under the temp dir
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let logs = dir.path().join("logs");
    let toml = format!(
        r#"
[acquisition]
readings_per_setpoint = 3
max_attempts = 3
backoff_step_ms = 0
resync_delay_ms = 0

[[banks]]
name = "PT Bank 1"
port = "sim"
sensor_count = 4

[logs]
dir = "{}"
"#,
        logs.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn ptcal(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ptcal_cli").unwrap();
    cmd.env_remove("PTCAL_TEST_SIM_TIMEOUT")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["calibrate", "--pressure", "0", "--pressure", "100"], 0, "PTBank1 calibration", "stdout")]
#[case(&["calibrate", "--pressure", "20", "--no-fit"], 0, "PTBank1 averages", "stdout")]
#[case(&["calibrate", "--pressure", "20"], 6, "Cannot fit sensor 0", "stderr")]
#[case(&["show"], 5, "calibration log is unusable", "stderr")]
#[case(&["test", "--bank", "nope"], 1, "No bank named 'nope'", "stderr")]
#[case(&["ports"], 0, "", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = if args.first().copied() == Some("--help") {
        Command::cargo_bin("ptcal_cli").unwrap()
    } else {
        ptcal(&cfg)
    };
    cmd.args(args);

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn calibrate_then_read_back() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    ptcal(&cfg)
        .args(["calibrate", "--pressure", "0", "--pressure", "100", "--pressure", "200"])
        .assert()
        .success();

    let logs = dir.path().join("logs");
    let avg = fs::read_to_string(logs.join("avg_readings_PTBank1.csv")).unwrap();
    assert_eq!(avg.lines().count(), 3);
    let raw = fs::read_to_string(logs.join("raw_readings_PTBank1.csv")).unwrap();
    assert_eq!(raw.lines().count(), 9);
    let cals = fs::read_to_string(logs.join("cals_PTBank1.csv")).unwrap();
    let rows: Vec<&str> = cals.lines().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].split(',').nth(1), Some("x"));
    assert_eq!(rows[1].split(',').nth(1), Some("y"));

    ptcal(&cfg)
        .args(["show", "--bank", "PT Bank 1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PTBank1 stored").and(predicate::str::contains("pt3:")));

    let out = ptcal(&cfg)
        .args(["test", "--sim-pressure", "150"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let psi: Vec<f64> = stdout
        .lines()
        .filter_map(|l| l.trim().strip_prefix("pt")?.split_once(": "))
        .filter_map(|(_, rest)| rest.split_whitespace().next()?.parse().ok())
        .collect();
    assert_eq!(psi.len(), 4, "stdout was: {stdout}");
    for p in psi {
        assert!((p - 150.0).abs() < 1.0, "calibrated {p}");
    }

    // Refit without --save leaves the calibration log alone
    ptcal(&cfg)
        .args(["refit", "--bank", "PTBank1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PTBank1 refit"));
    let after = fs::read_to_string(logs.join("cals_PTBank1.csv")).unwrap();
    assert_eq!(after.lines().count(), 2);

    ptcal(&cfg)
        .args(["refit", "--bank", "PTBank1", "--save"])
        .assert()
        .success();
    let after = fs::read_to_string(logs.join("cals_PTBank1.csv")).unwrap();
    assert_eq!(after.lines().count(), 4);
}

#[rstest]
fn calibrate_reads_pressures_from_stdin() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    ptcal(&cfg)
        .arg("calibrate")
        .write_stdin("0\nnot-a-number\n80\nfit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("not a pressure"))
        .stdout(predicate::str::contains("PTBank1 calibration"));

    let avg = fs::read_to_string(dir.path().join("logs/avg_readings_PTBank1.csv")).unwrap();
    assert_eq!(avg.lines().count(), 2);
}

#[rstest]
fn self_check_reads_one_frame() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    ptcal(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("PTBank1 on sim: OK (4 sensors)"));
}

#[rstest]
fn cli_reports_invalid_config() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(
        &cfg,
        r#"
[[banks]]
name = "PT1"
port = "sim"
sensor_count = 0
"#,
    )
    .unwrap();

    ptcal(&cfg)
        .arg("show")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains("sensor_count"));
}

#[rstest]
#[case::show(&["show"])]
#[case::test(&["test", "--bank", "PTBank1"])]
fn read_only_commands_leave_logs_alone(#[case] args: &[&str]) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    ptcal(&cfg).args(args).assert().code(5);
    assert!(!dir.path().join("logs").exists());
}
