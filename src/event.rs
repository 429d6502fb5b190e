//! Event payloads emitted by the CI server.
//!
//! Payloads arrive as JSON and are validated into typed structs before any
//! other processing. Only `status` and `settings.email` are required; every
//! other field is optional and renders as an empty segment when absent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{PayloadError, SettingsError};
use crate::settings::{EmailSettings, json_type};
use crate::status::StatusName;

/// Event topic a payload was published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BuildStatus,
    JobStatus,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::BuildStatus, EventKind::JobStatus];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BuildStatus => "build_status",
            EventKind::JobStatus => "job_status",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event '{}'", s))
    }
}

/// A validated event payload.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Build(BuildStatusEvent),
    Job(JobStatusEvent),
}

impl EventPayload {
    /// Validate a raw payload received on topic `kind`.
    pub fn from_value(kind: EventKind, value: &Value) -> Result<Self, PayloadError> {
        if !value.is_object() {
            return Err(PayloadError::NotAnObject(json_type(value)));
        }
        let malformed = |e: serde_json::Error| PayloadError::Malformed(e.to_string());
        match kind {
            EventKind::BuildStatus => BuildStatusEvent::deserialize(value)
                .map(EventPayload::Build)
                .map_err(malformed),
            EventKind::JobStatus => JobStatusEvent::deserialize(value)
                .map(EventPayload::Job)
                .map_err(malformed),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Build(_) => EventKind::BuildStatus,
            EventPayload::Job(_) => EventKind::JobStatus,
        }
    }

    pub fn status(&self) -> StatusName {
        match self {
            EventPayload::Build(event) => event.status,
            EventPayload::Job(event) => event.status,
        }
    }

    /// Only build events can be flagged as fixed.
    pub fn is_fixed(&self) -> bool {
        match self {
            EventPayload::Build(event) => event.is_fixed.unwrap_or(false),
            EventPayload::Job(_) => false,
        }
    }

    pub fn settings(&self) -> &EmailSettings {
        match self {
            EventPayload::Build(event) => &event.settings.email,
            EventPayload::Job(event) => &event.settings.email,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        match self {
            EventPayload::Build(event) => &event.pipeline,
            EventPayload::Job(event) => &event.pipeline,
        }
    }

    pub fn job_name(&self) -> &str {
        match self {
            EventPayload::Build(event) => event.job_name.as_deref().unwrap_or_default(),
            EventPayload::Job(event) => event.job_name.as_deref().unwrap_or_default(),
        }
    }
}

/// Payload of a `build_status` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatusEvent {
    pub status: StatusName,
    pub settings: NotificationSettings,
    #[serde(default)]
    pub is_fixed: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub build: Build,
    #[serde(default)]
    pub build_link: Option<String>,
}

/// Payload of a `job_status` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusEvent {
    pub status: StatusName,
    pub settings: NotificationSettings,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub pipeline_link: Option<String>,
}

/// The `settings` object of a payload. Only the `email` entry is read.
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub email: EmailSettings,
}

impl<'de> Deserialize<'de> for NotificationSettings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let map = value
            .as_object()
            .ok_or_else(|| SettingsError::NotAnObject(json_type(&value)))
            .map_err(serde::de::Error::custom)?;
        let email = map
            .get("email")
            .ok_or(SettingsError::MissingEmail)
            .map_err(serde::de::Error::custom)?;
        let email = EmailSettings::from_value(email).map_err(serde::de::Error::custom)?;
        Ok(NotificationSettings { email })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    #[serde(default, deserialize_with = "null_as_default")]
    pub scm_repo: ScmRepo,
    /// Older servers put the source directory on the pipeline itself.
    #[serde(default)]
    pub root_dir: Option<String>,
}

impl Pipeline {
    pub fn repo_name(&self) -> &str {
        self.scm_repo.name.as_deref().unwrap_or_default()
    }

    pub fn root_dir(&self) -> &str {
        self.scm_repo
            .root_dir
            .as_deref()
            .or(self.root_dir.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmRepo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub root_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Build {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: BuildMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub commit: CommitMeta,
    #[serde(default, deserialize_with = "null_as_default")]
    pub build: BuildRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMeta {
    /// Comma-joined list of file names.
    #[serde(default)]
    pub changed_files: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildRef {
    #[serde(default)]
    pub sha: Option<String>,
}

/// Producers send `null` for absent nested objects.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Build ids are numbers on some servers and strings on others.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "build id must be a string or a number, got {}",
            json_type(&other)
        ))),
    }
}
