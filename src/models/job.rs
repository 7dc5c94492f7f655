use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Prefixes of identifiers minted without contacting any backend.
const SYNTHETIC_PREFIXES: &[&str] = &["local-", "demo-"];

/// Opaque job identifier assigned by the backend at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for offline/demo identifiers that no job store knows about.
    pub fn is_synthetic(&self) -> bool {
        SYNTHETIC_PREFIXES.iter().any(|p| self.0.starts_with(p))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Remote pipeline a job runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobKind {
    AvatarCreation,
    VirtualTryon,
}

impl JobKind {
    /// Job store table holding records of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            JobKind::AvatarCreation => "avatar_jobs",
            JobKind::VirtualTryon => "tryon_jobs",
        }
    }
}

/// Lifecycle status of a job. `Timeout` is only ever synthesized client-side.
///
/// Statuses outside the known set are carried verbatim in `Other` so that a
/// record with an unfamiliar status still parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Timeout,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Timeout)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "timeout" => Self::Timeout,
            _ => Self::Other(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        match value {
            JobStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one named pipeline sub-step. Only `Completed` moves progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

pub type StepMetadata = BTreeMap<String, StepStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Image,
    Video,
    #[serde(other)]
    Other,
}

/// Location of one pipeline output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRef {
    pub kind: OutputKind,
    pub url: String,
}

/// A job record as read from the job store or pushed by the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JobId>,
    pub status: JobStatus,
    #[serde(default, alias = "stepMetadata", skip_serializing_if = "Option::is_none")]
    pub step_metadata: Option<StepMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<OutputRef>>,
    #[serde(default, alias = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, alias = "userId", alias = "user_id", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            id: None,
            status,
            step_metadata: None,
            result: None,
            error_message: None,
            owner: None,
            updated_at: None,
        }
    }
}

/// Handle returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: JobId,
}
