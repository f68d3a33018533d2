//! E2E tests for the usbloop command line tool

use std::path::Path;
use std::process::Command;

fn usbloop(config: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_usbloop"));
    cmd.arg("--config").arg(config);
    cmd
}

fn write_fast_config(path: &Path) {
    std::fs::write(
        path,
        r#"{"session": {"poll_timeout_ms": 1, "settle_ms": 20}}"#,
    )
    .unwrap();
}

#[test]
fn test_tone_simulate_analyze() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let tone = dir.path().join("tone.wav");
    let capture = dir.path().join("capture.wav");
    let report = dir.path().join("report.json");
    write_fast_config(&config);

    let status = usbloop(&config)
        .args(["tone", "--frequency", "1000", "--rate", "48000", "--duration-ms", "200"])
        .arg(&tone)
        .status()
        .unwrap();
    assert!(status.success());

    let status = usbloop(&config)
        .arg("simulate")
        .arg(&tone)
        .arg("--output")
        .arg(&capture)
        .arg("--report")
        .arg(&report)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(capture.exists());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["sample_rate"], 48000);
    assert_eq!(json["capture"]["samples_captured"], 9600);

    let output = usbloop(&config)
        .args(["analyze", "--json", "--nominal", "1000"])
        .arg(&capture)
        .output()
        .unwrap();
    assert!(output.status.success());
    let drift: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(drift["skew_ppm"].as_f64().unwrap().abs() < 1.0);
}

#[test]
fn test_analyze_against_reference() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let reference = dir.path().join("reference.wav");
    let capture = dir.path().join("slow.wav");
    write_fast_config(&config);

    // 50 ppm slow against the reference
    for (path, frequency) in [(&reference, "1000"), (&capture, "999.95")] {
        let status = usbloop(&config)
            .args(["tone", "--frequency", frequency, "--rate", "48000", "--duration-ms", "500"])
            .arg(path)
            .status()
            .unwrap();
        assert!(status.success());
    }

    let output = usbloop(&config)
        .args(["analyze", "--json", "--reference"])
        .arg(&reference)
        .arg(&capture)
        .output()
        .unwrap();
    assert!(output.status.success());

    let drift: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!((drift["nominal_hz"].as_f64().unwrap() - 1000.0).abs() < 0.01);
    assert!((drift["skew_ppm"].as_f64().unwrap() + 50.0).abs() < 1.0);
    let mismatch = drift["relative_mismatch"].as_f64().unwrap();
    assert!((mismatch - 50e-6).abs() < 1e-6, "mismatch {mismatch}");

    let text = usbloop(&config)
        .args(["analyze", "--reference"])
        .arg(&reference)
        .arg(&capture)
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert!(stdout.contains("Reference frequency:"));
    assert!(stdout.contains("Relative mismatch:"));
}

#[test]
fn test_simulate_missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    write_fast_config(&config);

    let status = usbloop(&config)
        .arg("simulate")
        .arg(dir.path().join("missing.wav"))
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn test_config_init_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("sub").join("config.json");

    let status = usbloop(&config).args(["config", "--init"]).status().unwrap();
    assert!(status.success());

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config).unwrap()).unwrap();
    assert_eq!(saved["session"]["poll_timeout_ms"], 10);
}
