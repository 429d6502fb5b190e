//! Centralized error types for buildmail using thiserror.
//!
//! Only [`ConfigError`] is fatal. Every other error is scoped to a single
//! notification cycle and ends in a log line, never in the event source.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid smtp.{field}: {message}")]
    InvalidSmtp { field: &'static str, message: String },
}

/// Errors returned by the subscriber settings validator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("settings must be an object, got {0}")]
    NotAnObject(&'static str),
    #[error("settings must contain an 'email' entry")]
    MissingEmail,
    #[error("email settings must be an address, a list of addresses or an object, got {0}")]
    InvalidShape(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidAddress(String),
    #[error("address list must contain at least one address")]
    EmptyAddresses,
    #[error("expected {expected} for '{field}'")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("unknown status '{0}'")]
    UnknownStatus(String),
    #[error("unknown field '{0}' in email settings")]
    UnknownField(String),
}

/// Errors raised while validating an inbound event payload.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("payload must be an object, got {0}")]
    NotAnObject(&'static str),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Errors related to template rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template render failed: {message}")]
    RenderFailed { message: String },
}

/// Errors related to email delivery.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to build email: {0}")]
    InvalidMessage(String),
    #[error("failed to configure transport: {0}")]
    Transport(String),
    #[error("failed to send notification: {0}")]
    SendFailed(String),
}

/// Errors that abandon a single notification cycle before dispatch.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

/// Errors raised by the line event source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid event envelope: {0}")]
    InvalidEnvelope(String),
    #[error("event line is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::string::FromUtf8Error),
    #[error("failed to read event stream: {0}")]
    Read(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::LoadError("file not found".to_string());
        assert_eq!(
            err.to_string(),
            "failed to load config file: file not found"
        );

        let err = ConfigError::ValidationError("missing field".to_string());
        assert_eq!(err.to_string(), "invalid configuration: missing field");
    }

    #[test]
    fn config_error_invalid_smtp_display() {
        let err = ConfigError::InvalidSmtp {
            field: "from",
            message: "'nope' is not a valid address".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid smtp.from: 'nope' is not a valid address"
        );
    }

    #[test]
    fn settings_error_display() {
        assert_eq!(
            SettingsError::MissingEmail.to_string(),
            "settings must contain an 'email' entry"
        );
        assert_eq!(
            SettingsError::UnknownStatus("DUMMY_STATUS".to_string()).to_string(),
            "unknown status 'DUMMY_STATUS'"
        );
        assert_eq!(
            SettingsError::InvalidType {
                field: "statuses",
                expected: "a list of status names"
            }
            .to_string(),
            "expected a list of status names for 'statuses'"
        );
    }

    #[test]
    fn notify_error_display() {
        let err = NotifyError::SendFailed("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "failed to send notification: connection refused"
        );
    }

    #[test]
    fn event_error_wraps_sources() {
        let err = EventError::Payload(PayloadError::NotAnObject("array"));
        assert_eq!(
            err.to_string(),
            "payload error: payload must be an object, got array"
        );

        let err = EventError::Template(TemplateError::RenderFailed {
            message: "undefined filter".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "template error: template render failed: undefined filter"
        );
    }
}
