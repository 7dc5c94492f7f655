use serde::{Deserialize, Serialize};

use crate::models::job::{JobId, JobKind, JobStatus, OutputRef};

/// Canonical progress derived from a raw job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// 0..=100
    pub percentage: u8,
    pub stage: String,
}

/// What a consumer callback receives, regardless of delivery path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub percentage: u8,
    pub stage: String,
    /// Present only when `status` is `Completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<OutputRef>>,
    /// Present only when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Final state of a job as seen by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<'a> {
    Completed(&'a [OutputRef]),
    /// Known bad outcome: a new job is needed.
    Failed(&'a str),
    /// Unknown outcome: the job may still finish remotely.
    TimedOut,
}

impl JobUpdate {
    /// Synthesized terminal update for a job whose polling budget ran out.
    pub fn timed_out(kind: JobKind, job_id: JobId, last_percentage: u8) -> Self {
        Self {
            job_id,
            kind,
            status: JobStatus::Timeout,
            percentage: last_percentage,
            stage: JobStatus::Timeout.to_string(),
            result: None,
            error_message: None,
        }
    }

    /// Synthesized completion for an offline job that was never sent to a backend.
    pub fn synthetic_completion(kind: JobKind, job_id: JobId) -> Self {
        Self {
            job_id,
            kind,
            status: JobStatus::Completed,
            percentage: 100,
            stage: JobStatus::Completed.to_string(),
            result: Some(Vec::new()),
            error_message: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn outcome(&self) -> Option<Outcome<'_>> {
        match self.status {
            JobStatus::Completed => Some(Outcome::Completed(self.result.as_deref().unwrap_or(&[]))),
            JobStatus::Failed => Some(Outcome::Failed(self.error_message.as_deref().unwrap_or(""))),
            JobStatus::Timeout => Some(Outcome::TimedOut),
            JobStatus::Pending | JobStatus::Processing | JobStatus::Other(_) => None,
        }
    }
}
