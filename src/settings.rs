//! Subscriber email settings: validation and normalization.
//!
//! Subscribers describe who gets notified in one of three shapes:
//!
//! ```yaml
//! email: dev@example.com                       # a single address
//! email: [dev@example.com, ops@example.com]    # a list of addresses
//! email:                                       # the full form
//!   addresses: [dev@example.com]
//!   statuses: [SUCCESS, FAILURE]
//! ```
//!
//! The shapes are parsed into [`EmailSettings`] at the boundary and
//! immediately folded into one canonical [`Subscription`] by [`normalize`].

use std::str::FromStr;

use lettre::Address;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SettingsError;
use crate::status::StatusName;

/// Statuses a subscriber receives when none are listed.
pub const DEFAULT_STATUSES: [StatusName; 1] = [StatusName::Failure];

/// Email settings exactly as the subscriber wrote them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailSettings {
    /// `email: a@example.com`
    Address(String),
    /// `email: [a@example.com, b@example.com]`
    Addresses(Vec<String>),
    /// `email: { addresses: [...], statuses: [...] }`
    Detailed {
        addresses: Option<Vec<String>>,
        statuses: Option<Vec<StatusName>>,
    },
}

/// Canonical subscription derived from [`EmailSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub addresses: Vec<String>,
    pub statuses: Vec<StatusName>,
}

impl Subscription {
    /// Whether `status` is one of the subscribed statuses.
    pub fn wants(&self, status: StatusName) -> bool {
        self.statuses.contains(&status)
    }
}

/// Fold any settings shape into a fresh [`Subscription`].
///
/// Omitted statuses default to [`DEFAULT_STATUSES`]; omitted addresses
/// become an empty list.
pub fn normalize(raw: &EmailSettings) -> Subscription {
    match raw {
        EmailSettings::Address(address) => Subscription {
            addresses: vec![address.clone()],
            statuses: DEFAULT_STATUSES.to_vec(),
        },
        EmailSettings::Addresses(addresses) => Subscription {
            addresses: addresses.clone(),
            statuses: DEFAULT_STATUSES.to_vec(),
        },
        EmailSettings::Detailed {
            addresses,
            statuses,
        } => Subscription {
            addresses: addresses.clone().unwrap_or_default(),
            statuses: statuses
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUSES.to_vec()),
        },
    }
}

/// Validate a subscriber settings blob of the form `{ "email": ... }`.
///
/// This is the entry point for configuration tooling: it never panics and
/// reports the first problem found. Settings for other notification
/// channels sitting next to `email` are ignored.
pub fn validate_settings(raw: &Value) -> Result<EmailSettings, SettingsError> {
    let map = raw
        .as_object()
        .ok_or(SettingsError::NotAnObject(json_type(raw)))?;
    let email = map.get("email").ok_or(SettingsError::MissingEmail)?;
    EmailSettings::from_value(email)
}

impl EmailSettings {
    /// Parse the value of an `email` settings entry.
    pub fn from_value(value: &Value) -> Result<Self, SettingsError> {
        match value {
            Value::String(address) => Ok(Self::Address(parse_address(address)?)),
            Value::Array(items) => Ok(Self::Addresses(parse_address_list(items)?)),
            Value::Object(map) => parse_detailed(map),
            other => Err(SettingsError::InvalidShape(json_type(other))),
        }
    }
}

impl<'de> Deserialize<'de> for EmailSettings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        EmailSettings::from_value(&value).map_err(serde::de::Error::custom)
    }
}

fn parse_detailed(map: &Map<String, Value>) -> Result<EmailSettings, SettingsError> {
    if let Some(unknown) = map
        .keys()
        .find(|key| !matches!(key.as_str(), "addresses" | "statuses"))
    {
        return Err(SettingsError::UnknownField(unknown.clone()));
    }

    let addresses = match map.get("addresses") {
        None => None,
        Some(Value::Array(items)) => Some(parse_address_list(items)?),
        Some(_) => {
            return Err(SettingsError::InvalidType {
                field: "addresses",
                expected: "a list of email addresses",
            });
        }
    };

    let statuses = match map.get("statuses") {
        None => None,
        Some(Value::Array(items)) => Some(parse_statuses(items)?),
        Some(_) => {
            return Err(SettingsError::InvalidType {
                field: "statuses",
                expected: "a list of status names",
            });
        }
    };

    Ok(EmailSettings::Detailed {
        addresses,
        statuses,
    })
}

fn parse_address(raw: &str) -> Result<String, SettingsError> {
    Address::from_str(raw)
        .map(|_| raw.to_string())
        .map_err(|_| SettingsError::InvalidAddress(raw.to_string()))
}

fn parse_address_list(items: &[Value]) -> Result<Vec<String>, SettingsError> {
    if items.is_empty() {
        return Err(SettingsError::EmptyAddresses);
    }
    items
        .iter()
        .map(|item| match item {
            Value::String(address) => parse_address(address),
            _ => Err(SettingsError::InvalidType {
                field: "addresses",
                expected: "a list of email addresses",
            }),
        })
        .collect()
}

fn parse_statuses(items: &[Value]) -> Result<Vec<StatusName>, SettingsError> {
    items
        .iter()
        .map(|item| match item {
            Value::String(name) => name
                .parse::<StatusName>()
                .map_err(|e| SettingsError::UnknownStatus(e.0)),
            _ => Err(SettingsError::InvalidType {
                field: "statuses",
                expected: "a list of status names",
            }),
        })
        .collect()
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
