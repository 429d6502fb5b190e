//! Tests for Config loading and validation.

use super::*;
use crate::error::ConfigError;
use crate::event::EventKind;
use serde_json::json;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// ============================================================
// Config Loading Tests
// ============================================================

#[test]
fn load_valid_config() {
    let config = Config::load(&fixture_path("config_valid.yaml")).unwrap();

    assert_eq!(config.smtp.host, "smtp.example.com");
    assert_eq!(config.smtp.port, 587);
    assert_eq!(config.smtp.from, "CI Bot <ci@example.com>");
    // Placeholders are kept until the transport is built
    assert_eq!(config.smtp.username.as_deref(), Some("${SMTP_USER}"));
    assert_eq!(
        config.smtp.password.as_ref().map(|p| p.expose()),
        Some("${SMTP_PASSWORD}")
    );
    assert_eq!(config.smtp.tls, TlsMode::Starttls);
    assert!(config.smtp.tls_verify);

    assert_eq!(config.product_name, "Screwdriver");
    assert_eq!(config.events, vec![EventKind::BuildStatus, EventKind::JobStatus]);
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9191);

    assert!(config.validate().is_ok());
}

#[test]
fn load_minimal_config_applies_defaults() {
    let config = Config::load(&fixture_path("config_minimal.yaml")).unwrap();

    assert_eq!(config.smtp.tls, TlsMode::None);
    assert!(config.smtp.tls_verify);
    assert!(config.smtp.username.is_none());
    assert!(config.smtp.password.is_none());
    assert_eq!(config.product_name, "Screwdriver");
    assert_eq!(config.events, EventKind::ALL.to_vec());
    assert!(!config.metrics.enabled);
    assert_eq!(config.metrics.port, 9090);

    assert!(config.validate().is_ok());
}

#[test]
fn load_nonexistent_file_returns_load_error() {
    let result = Config::load(std::path::Path::new("/nonexistent/path/config.yaml"));
    match result.unwrap_err() {
        ConfigError::LoadError(msg) => {
            assert!(msg.contains("/nonexistent/path/config.yaml"));
        }
        e => panic!("Expected LoadError, got {:?}", e),
    }
}

#[test]
fn load_invalid_yaml_returns_validation_error() {
    let result = Config::load(&fixture_path("config_invalid_yaml.yaml"));
    match result.unwrap_err() {
        ConfigError::ValidationError(_) => {}
        e => panic!("Expected ValidationError, got {:?}", e),
    }
}

#[test]
fn load_non_integer_port_returns_validation_error() {
    let result = Config::load(&fixture_path("config_invalid_port.yaml"));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn unknown_event_kind_is_rejected() {
    let yaml = r#"
smtp:
  host: localhost
  port: 25
  from: ci@example.com
events:
  - pr_opened
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("pr_opened"));
}

#[test]
fn unknown_tls_mode_is_rejected() {
    let yaml = r#"
smtp:
  host: localhost
  port: 25
  from: ci@example.com
  tls: sometimes
"#;
    assert!(Config::from_yaml(yaml).is_err());
}

// ============================================================
// Config Validation Tests
// ============================================================

#[test]
fn validate_collects_all_errors() {
    let config = Config::load(&fixture_path("config_invalid_values.yaml")).unwrap();
    let errors = config.validate().unwrap_err();

    // smtp (first failing field), product_name, events
    assert_eq!(errors.len(), 3, "got: {:?}", errors);
    assert!(matches!(
        errors[0],
        ConfigError::InvalidSmtp { field: "host", .. }
    ));
    assert!(errors[1].to_string().contains("product_name"));
    assert!(errors[2].to_string().contains("events"));
}

#[test]
fn validate_rejects_zero_metrics_port_when_enabled() {
    let yaml = r#"
smtp:
  host: localhost
  port: 25
  from: ci@example.com
metrics:
  enabled: true
  port: 0
"#;
    let config = Config::from_yaml(yaml).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("metrics.port"));
}

// ============================================================
// SmtpConfig Tests
// ============================================================

#[test]
fn smtp_from_value_accepts_full_object() {
    let smtp = SmtpConfig::from_value(&json!({
        "host": "smtp.example.com",
        "port": 465,
        "from": "user@email.com",
        "username": "user",
        "password": "pass",
        "tls": "tls",
        "tls_verify": false
    }))
    .unwrap();

    assert_eq!(smtp.host, "smtp.example.com");
    assert_eq!(smtp.port, 465);
    assert_eq!(smtp.username.as_deref(), Some("user"));
    assert_eq!(smtp.password.as_ref().map(|p| p.expose()), Some("pass"));
    assert_eq!(smtp.tls, TlsMode::Tls);
    assert!(!smtp.tls_verify);
    assert!(smtp.validate().is_ok());
}

#[test]
fn smtp_from_value_rejects_wrong_types() {
    let base = || {
        json!({
            "host": "smtp.example.com",
            "port": 25,
            "from": "user@email.com"
        })
    };

    let mut host = base();
    host["host"] = json!(22);
    assert!(SmtpConfig::from_value(&host).is_err());

    let mut port = base();
    port["port"] = json!("nonIntegerPort");
    assert!(SmtpConfig::from_value(&port).is_err());

    let mut username = base();
    username["username"] = json!(22);
    assert!(SmtpConfig::from_value(&username).is_err());

    let mut password = base();
    password["password"] = json!(22);
    assert!(SmtpConfig::from_value(&password).is_err());
}

#[test]
fn smtp_from_value_rejects_non_object() {
    let err = SmtpConfig::from_value(&json!(["host", 25])).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(SmtpConfig::from_value(&json!("smtp.example.com")).is_err());
}

#[test]
fn smtp_from_value_rejects_out_of_range_port() {
    let value = json!({ "host": "h", "port": 70000, "from": "user@email.com" });
    assert!(SmtpConfig::from_value(&value).is_err());
}

#[test]
fn smtp_validate_rejects_non_email_from() {
    let smtp = SmtpConfig::new("smtp.example.com", 25, "nonEmailString");
    match smtp.validate().unwrap_err() {
        ConfigError::InvalidSmtp { field, message } => {
            assert_eq!(field, "from");
            assert!(message.contains("nonEmailString"));
        }
        e => panic!("Expected InvalidSmtp, got {:?}", e),
    }
}

#[test]
fn smtp_validate_rejects_zero_port_and_empty_host() {
    let zero = SmtpConfig::new("smtp.example.com", 0, "user@email.com");
    assert!(matches!(
        zero.validate(),
        Err(ConfigError::InvalidSmtp { field: "port", .. })
    ));

    let blank = SmtpConfig::new("  ", 25, "user@email.com");
    assert!(matches!(
        blank.validate(),
        Err(ConfigError::InvalidSmtp { field: "host", .. })
    ));
}

#[test]
fn smtp_validate_requires_paired_credentials() {
    let mut only_user = SmtpConfig::new("h", 25, "user@email.com");
    only_user.username = Some("user".into());
    assert!(matches!(
        only_user.validate(),
        Err(ConfigError::InvalidSmtp { field: "password", .. })
    ));

    let mut only_pass = SmtpConfig::new("h", 25, "user@email.com");
    only_pass.password = Some(SecretString::new("pass".into()));
    assert!(matches!(
        only_pass.validate(),
        Err(ConfigError::InvalidSmtp { field: "username", .. })
    ));

    let both = SmtpConfig::new("h", 25, "user@email.com").with_credentials("user", "pass");
    assert!(both.validate().is_ok());
}

#[test]
fn smtp_debug_does_not_leak_password() {
    let smtp = SmtpConfig::new("h", 25, "user@email.com").with_credentials("user", "s3cr3t-value");
    let debug = format!("{:?}", smtp);
    assert!(!debug.contains("s3cr3t-value"));
    assert!(debug.contains("REDACTED"));
}
