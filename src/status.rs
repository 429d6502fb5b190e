//! Build status names and their display attributes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status reported by the CI server for a build or job.
///
/// The set is closed: any other name is rejected when a payload or a
/// subscription is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusName {
    Success,
    Failure,
    Aborted,
    Running,
    Queued,
    Created,
    Blocked,
    Unstable,
    Frozen,
    Fixed,
}

impl StatusName {
    /// Every known status, in display order.
    pub const ALL: [StatusName; 10] = [
        StatusName::Success,
        StatusName::Failure,
        StatusName::Aborted,
        StatusName::Running,
        StatusName::Queued,
        StatusName::Created,
        StatusName::Blocked,
        StatusName::Unstable,
        StatusName::Frozen,
        StatusName::Fixed,
    ];

    /// Wire name of the status (e.g. `"FAILURE"`).
    pub fn as_str(self) -> &'static str {
        match self {
            StatusName::Success => "SUCCESS",
            StatusName::Failure => "FAILURE",
            StatusName::Aborted => "ABORTED",
            StatusName::Running => "RUNNING",
            StatusName::Queued => "QUEUED",
            StatusName::Created => "CREATED",
            StatusName::Blocked => "BLOCKED",
            StatusName::Unstable => "UNSTABLE",
            StatusName::Frozen => "FROZEN",
            StatusName::Fixed => "FIXED",
        }
    }

    /// Accent color used in the HTML message (`#rrggbb`).
    pub fn color(self) -> &'static str {
        match self {
            StatusName::Success | StatusName::Fixed => "#36a64f",
            StatusName::Failure => "#ff0000",
            StatusName::Aborted => "#767676",
            StatusName::Running | StatusName::Queued | StatusName::Created => "#0f69ff",
            StatusName::Blocked => "#cccccc",
            StatusName::Unstable => "#ffd333",
            StatusName::Frozen => "#acd9ff",
        }
    }

    /// One-line human description shown under the status.
    pub fn description(self) -> &'static str {
        match self {
            StatusName::Success => "Everything looks good!",
            StatusName::Failure => "Did not work as expected.",
            StatusName::Aborted => "Aborted mid-flight",
            StatusName::Running => "Testing your code...",
            StatusName::Queued => "Looking for a place to park...",
            StatusName::Created => "Created and waiting to start.",
            StatusName::Blocked => "Blocked by another build.",
            StatusName::Unstable => "Finished, but some steps were unstable.",
            StatusName::Frozen => "Frozen by a freeze window.",
            StatusName::Fixed => "Back to green after a failure.",
        }
    }
}

impl fmt::Display for StatusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known status name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for StatusName {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusName::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
