//! Core configuration types and loading.

use super::secret::SecretString;
use super::validation::{validate_from_address, validate_product_name};
use crate::error::ConfigError;
use crate::event::EventKind;
use crate::template::DEFAULT_PRODUCT_NAME;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/buildmail/config.yaml";

/// Main configuration structure for buildmail.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// SMTP relay and sender settings.
    pub smtp: SmtpConfig,
    /// Product name shown in subjects (e.g. "Screwdriver").
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// Event topics the notifier listens to.
    #[serde(default = "default_events")]
    pub events: Vec<EventKind>,
    /// Metrics exposition configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// SMTP server configuration.
///
/// `username` and `password` must be given together; leaving both out
/// disables authentication. Both support `${ENV_VAR}` substitution.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Sender address.
    pub from: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub tls: TlsMode,
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

/// TLS mode for SMTP connections.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain text only.
    None,
    /// Upgrade with STARTTLS when the server offers it.
    #[default]
    Opportunistic,
    /// Require STARTTLS.
    Starttls,
    /// Implicit TLS from the first byte (usually port 465).
    Tls,
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics exposition is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Port to expose metrics on (default: 9090).
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_product_name() -> String {
    DEFAULT_PRODUCT_NAME.to_string()
}

fn default_events() -> Vec<EventKind> {
    EventKind::ALL.to_vec()
}

fn default_true() -> bool {
    true
}

impl SmtpConfig {
    /// Minimal configuration without authentication.
    pub fn new(host: impl Into<String>, port: u16, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            from: from.into(),
            username: None,
            password: None,
            tls: TlsMode::default(),
            tls_verify: true,
        }
    }

    /// Add SMTP credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Parse an SMTP configuration from an untyped value.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] for any shape or type mismatch
    /// (non-object config, non-string host, non-integer port, ...).
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::ValidationError(
                "smtp configuration must be an object".to_string(),
            ));
        }
        SmtpConfig::deserialize(value)
            .map_err(|e| ConfigError::ValidationError(format!("smtp: {}", e)))
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    /// Returns the first [`ConfigError::InvalidSmtp`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidSmtp {
                field: "host",
                message: "must not be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidSmtp {
                field: "port",
                message: "must be between 1 and 65535".to_string(),
            });
        }
        validate_from_address(&self.from).map_err(|message| ConfigError::InvalidSmtp {
            field: "from",
            message,
        })?;
        match (&self.username, &self.password) {
            (Some(_), None) => Err(ConfigError::InvalidSmtp {
                field: "password",
                message: "required when smtp.username is set".to_string(),
            }),
            (None, Some(_)) => Err(ConfigError::InvalidSmtp {
                field: "username",
                message: "required when smtp.password is set".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the whole configuration, collecting every error (fail-fast
    /// at startup, but report everything at once).
    ///
    /// # Errors
    /// Returns a `Vec<ConfigError>` containing all validation errors found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.smtp.validate() {
            errors.push(e);
        }

        if let Err(message) = validate_product_name(&self.product_name) {
            errors.push(ConfigError::ValidationError(format!(
                "product_name: {}",
                message
            )));
        }

        if self.events.is_empty() {
            errors.push(ConfigError::ValidationError(
                "events: at least one event must be listed".to_string(),
            ));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            errors.push(ConfigError::ValidationError(
                "metrics.port: must be between 1 and 65535".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
