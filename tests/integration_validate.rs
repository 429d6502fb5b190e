//! Integration tests for the --validate and --check-settings CLI modes.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn buildmail() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_buildmail"));
    cmd.env_remove("LOG_FORMAT");
    cmd
}

fn validate(config: &std::path::Path) -> Output {
    buildmail()
        .args(["--validate", "-c"])
        .arg(config)
        .output()
        .expect("Failed to run buildmail")
}

#[test]
fn validate_valid_config_exits_success() {
    let output = validate(&fixture_path("config_valid.yaml"));

    assert!(
        output.status.success(),
        "buildmail --validate should exit with code 0 for valid config\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration is valid"), "stdout: {}", stdout);
    assert!(stdout.contains("smtp.example.com:587"), "stdout: {}", stdout);
    assert!(stdout.contains("Auth: enabled"), "stdout: {}", stdout);
    assert!(
        stdout.contains("build_status, job_status"),
        "stdout: {}",
        stdout
    );
    // Credentials are never printed
    assert!(!stdout.contains("SMTP_PASSWORD"));
}

#[test]
fn validate_minimal_config_exits_success() {
    let output = validate(&fixture_path("config_minimal.yaml"));
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Auth: disabled"), "stdout: {}", stdout);
    assert!(stdout.contains("Product: Screwdriver"), "stdout: {}", stdout);
    assert!(stdout.contains("Metrics: disabled"), "stdout: {}", stdout);
}

#[test]
fn validate_invalid_yaml_exits_failure() {
    let output = validate(&fixture_path("config_invalid_yaml.yaml"));
    assert!(!output.status.success());
}

#[test]
fn validate_non_integer_port_exits_failure() {
    let output = validate(&fixture_path("config_invalid_port.yaml"));
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Configuration is valid"));
}

#[test]
fn validate_reports_every_error() {
    let output = validate(&fixture_path("config_invalid_values.yaml"));
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("smtp.host"), "stderr: {}", stderr);
    assert!(stderr.contains("product_name"), "stderr: {}", stderr);
    assert!(stderr.contains("events"), "stderr: {}", stderr);
}

#[test]
fn validate_nonexistent_file_exits_failure() {
    let output = validate(std::path::Path::new("/nonexistent/buildmail.yaml"));
    assert!(!output.status.success());
}

#[test]
fn validate_config_from_tempfile() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "smtp:\n  host: relay.internal\n  port: 2525\n  from: ci@example.com\nproduct_name: Acme CI\nevents: [job_status]"
    )
    .unwrap();

    let output = validate(file.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Product: Acme CI"), "stdout: {}", stdout);
    assert!(stdout.contains("Events: job_status"), "stdout: {}", stdout);
}

// =============================================================================
// --check-settings
// =============================================================================

#[test]
fn check_settings_prints_normalized_subscription() {
    let output = buildmail()
        .args(["--check-settings", r#"{"email":"notify.me@email.com"}"#])
        .output()
        .expect("Failed to run buildmail");
    assert!(output.status.success());

    let subscription: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(
        subscription,
        serde_json::json!({
            "addresses": ["notify.me@email.com"],
            "statuses": ["FAILURE"]
        })
    );
}

#[test]
fn check_settings_rejects_unknown_status() {
    let output = buildmail()
        .args([
            "--check-settings",
            r#"{"email":{"addresses":["a@email.com"],"statuses":["DUMMY_STATUS"]}}"#,
        ])
        .output()
        .expect("Failed to run buildmail");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DUMMY_STATUS"), "stderr: {}", stderr);
}

#[test]
fn check_settings_rejects_invalid_json() {
    let output = buildmail()
        .args(["--check-settings", "{not json"])
        .output()
        .expect("Failed to run buildmail");
    assert!(!output.status.success());
}
