//! Command-line interface for buildmail using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Plain text lines (default).
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Email notifications for CI build and job status events.
///
/// Reads newline-delimited JSON events from stdin.
#[derive(Parser, Debug)]
#[command(name = "buildmail")]
#[command(version)]
#[command(about = "Email notifications for CI build and job status events")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Validate configuration and exit.
    #[arg(long = "validate")]
    pub validate: bool,

    /// Validate a subscriber settings object (JSON), print the normalized
    /// subscription and exit. No configuration file is read.
    #[arg(long = "check-settings", value_name = "JSON", conflicts_with = "validate")]
    pub check_settings: Option<String>,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}
