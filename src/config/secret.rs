//! Redacted holder for the SMTP password.

use serde::Deserialize;

/// The SMTP relay password, read from `smtp.password`.
///
/// The raw value may still hold a `${VAR}` placeholder; it is resolved when
/// [`TransportSettings`](crate::notify::TransportSettings) is built and stays
/// wrapped there. Both `Debug` and `Display` print `[REDACTED]`, which is what
/// lets `SmtpConfig`, `TransportSettings` and `EmailNotifier` derive or
/// implement `Debug` and appear in log fields.
///
/// ```
/// use buildmail::config::SecretString;
///
/// let password = SecretString::new("relay-pass".to_string());
/// assert_eq!(format!("{:?}", password), "[REDACTED]");
/// assert_eq!(password.expose(), "relay-pass");
/// ```
#[derive(Clone)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        SecretString(s)
    }

    /// Raw value. Only the transport builder and env resolution call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

const REDACTED: &str = "[REDACTED]";

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}
