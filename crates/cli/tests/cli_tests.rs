//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};

fn infer(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_infer"))
        .args(args)
        .env_remove("INFER_API_URL")
        .env_remove("CONFIG_PATH")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = infer(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Tabular Inference Service"),
        "Should show app name"
    );
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("remote"), "Should show remote command");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = infer(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("infer"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = infer(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "predict help should succeed");
    assert!(stdout.contains("--input"), "Should show input option");
    assert!(stdout.contains("--output"), "Should show output option");
    assert!(stdout.contains("--config"), "Should show config option");
}

/// Test remote subcommand help
#[test]
fn test_remote_help() {
    let output = infer(&["remote", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "remote help should succeed");
    assert!(stdout.contains("health"), "Should show health command");
    assert!(stdout.contains("predict-one"), "Should show predict-one command");
    assert!(stdout.contains("predict-csv"), "Should show predict-csv command");
}

/// Test that predict requires an input file
#[test]
fn test_predict_requires_input() {
    let output = infer(&["predict"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "predict without input should fail");
    assert!(stderr.contains("--input"), "Should mention the missing option");
}

/// Test invalid output format is rejected
#[test]
fn test_invalid_format() {
    let output = infer(&["--format", "xml", "remote", "health"]);

    assert!(!output.status.success(), "Invalid format should fail");
}

fn write_fixture(dir: &Path) -> (String, String, String) {
    let model = dir.join("model.json");
    std::fs::write(
        &model,
        r#"{"kind": "logistic", "features": ["x"], "weights": [1.0], "intercept": -7.0}"#,
    )
    .unwrap();

    let config = dir.join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "model_path: {}\ntarget_col: y\ndrop_cols: [id]\nthreshold: 0.5\ntop_k: 1\nschema_path: {}\n",
            model.display(),
            dir.join("no_schema.json").display()
        ),
    )
    .unwrap();

    let input = dir.join("input.csv");
    std::fs::write(&input, "id,x,y\n1,5,0\n2,9,1\n").unwrap();

    (
        config.display().to_string(),
        input.display().to_string(),
        dir.join("predictions.csv").display().to_string(),
    )
}

/// Test a local batch prediction end to end
#[test]
fn test_predict_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let (config, input, output_path) = write_fixture(dir.path());

    let output = infer(&[
        "predict", "--input", &input, "--output", &output_path, "--config", &config,
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        output.status.success(),
        "predict should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains(&format!("Saved: {}", output_path)));

    let written = std::fs::read_to_string(&output_path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "proba,top_k_flag");
    assert!(lines[1].ends_with(",0"));
    assert!(lines[2].ends_with(",1"));
}

/// Test JSON output of a local batch prediction
#[test]
fn test_predict_json_summary() {
    let dir = tempfile::tempdir().unwrap();
    let (config, input, output_path) = write_fixture(dir.path());

    let output = infer(&[
        "--format", "json", "predict", "--input", &input, "--output", &output_path, "--config",
        &config,
    ]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["n_rows"], serde_json::json!(2));
    assert_eq!(summary["saved"], serde_json::json!(output_path));
}

/// Test global flags are accepted after the subcommand
#[test]
fn test_global_flags_after_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let (config, input, output_path) = write_fixture(dir.path());

    let output = infer(&[
        "predict", "--input", &input, "--output", &output_path, "--config", &config, "--format",
        "json", "--verbose",
    ]);
    assert!(
        output.status.success(),
        "trailing global flags should parse: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["n_rows"], serde_json::json!(2));
}

/// Test missing config fails without writing output
#[test]
fn test_predict_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let (_config, input, output_path) = write_fixture(dir.path());
    let missing = dir.path().join("missing.yaml").display().to_string();

    let output = infer(&[
        "predict", "--input", &input, "--output", &output_path, "--config", &missing,
    ]);

    assert!(!output.status.success(), "Missing config should fail");
    assert!(!Path::new(&output_path).exists());
}
