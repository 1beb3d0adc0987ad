use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;

fn autoscale() -> Command {
    Command::cargo_bin("autoscale").unwrap()
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("autoscale.toml");
    fs::write(&path, body).unwrap();
    path
}

const SIM_CFG: &str = r#"
[device]
id = "bench-01"

[sensor]
kind = "simulated"

[simulation]
zero_raw = 842913
counts_per_gram = 9863.233
noise_counts = 50
sample_period_ms = 12
"#;

#[test]
fn help_lists_subcommands() {
    autoscale()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("self-check"));
}

#[test]
fn exec_help_needs_no_sensor() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "[sensor]\nkind = \"hx711\"\n[pins]\nhx711_dt = 5\nhx711_sck = 6\n");
    autoscale()
        .args(["--config", cfg.to_str().unwrap(), "exec", "help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cal1 <g>"));
}

#[test]
fn solve_without_points_fails_with_calibration_code() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), SIM_CFG);
    autoscale()
        .args(["--config", cfg.to_str().unwrap(), "exec", "solve"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("missing calibration point 1"));
}

#[rstest]
#[case(&["weigh"])]
#[case(&["cal"])]
#[case(&["cal", "-5"])]
fn bad_commands_are_usage_errors(#[case] line: &[&str]) {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), SIM_CFG);
    autoscale()
        .args(["--config", cfg.to_str().unwrap(), "exec"])
        .args(line)
        .assert()
        .code(2);
}

#[test]
fn tare_prints_zero_offset() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), SIM_CFG);
    autoscale()
        .args(["--config", cfg.to_str().unwrap(), "exec", "tare"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[TARE] zero offset = 84"));
}

#[test]
fn invalid_config_is_explained() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "[capture]\nema_alpha = 0.0\n");
    autoscale()
        .args(["--config", cfg.to_str().unwrap(), "self-check"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains("ema_alpha"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    autoscale()
        .args([
            "--config",
            dir.path().join("nope.toml").to_str().unwrap(),
            "self-check",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unreadable"));
}

#[test]
fn calibration_csv_with_bad_headers_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), SIM_CFG);
    let csv = dir.path().join("cal.csv");
    fs::write(&csv, "counts,mass\n842913,0\n1829236,100\n").unwrap();
    autoscale()
        .args([
            "--config",
            cfg.to_str().unwrap(),
            "--calibration",
            csv.to_str().unwrap(),
            "self-check",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers in calibration CSV"));
}

#[test]
fn self_check_reads_the_simulated_cell() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), SIM_CFG);
    autoscale()
        .args(["--config", cfg.to_str().unwrap(), "self-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check ok: raw = "));
}

#[test]
fn json_errors_are_machine_readable() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), SIM_CFG);
    let out = autoscale()
        .args(["--json", "--config", cfg.to_str().unwrap(), "exec", "solve"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "MissingCalibrationPoint");
}

#[test]
fn run_captures_a_session_to_jsonl() {
    let dir = tempfile::tempdir().unwrap();
    let sessions = dir.path().join("sessions.jsonl");
    let body = format!(
        r#"{SIM_CFG}
steps = [{{ at_ms = 1500, kg = 5.0 }}, {{ at_ms = 2500, kg = 0.0 }}]

[capture]
ema_alpha = 1.0
idle_poll_ms = 20
arm_stable_ms = 200
hold_ms = 200
cooldown_ms = 100

[upload]
path = "{}"
"#,
        sessions.display().to_string().replace('\\', "/")
    );
    let cfg = write_config(dir.path(), &body);
    autoscale()
        .args([
            "--config",
            cfg.to_str().unwrap(),
            "run",
            "--no-stdin",
            "--max-runtime-ms",
            "4000",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 session(s), 1 uploaded"));

    let text = fs::read_to_string(&sessions).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(v["scale_id"], "bench-01");
    let samples = v["samples"].as_array().unwrap();
    assert!(samples.len() > 20);
    let ts: Vec<u64> = samples.iter().map(|s| s["t"].as_u64().unwrap()).collect();
    assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    let peak = samples
        .iter()
        .map(|s| s["kg"].as_f64().unwrap())
        .fold(0.0f64, f64::max);
    assert!((peak - 5.0).abs() < 0.05, "peak {peak}");
}
