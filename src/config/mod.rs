//! Configuration loading and validation for buildmail.
//!
//! This module handles loading the YAML configuration file,
//! validation, and resolving environment variables for SMTP credentials.

mod env;
mod secret;
mod types;
mod validation;

// Re-exports publics
pub use env::resolve_env_vars;
pub use secret::SecretString;
pub use types::{Config, DEFAULT_CONFIG_PATH, MetricsConfig, SmtpConfig, TlsMode};

#[cfg(test)]
mod tests;
