//! Progress aggregation.
//!
//! Maps raw job records onto a single `{percentage, stage}` pair using a fixed,
//! per-pipeline threshold table. Everything here except [`build_update`] is pure.

use crate::models::job::{JobId, JobKind, JobRecord, JobStatus, StepMetadata, StepStatus};
use crate::models::update::{JobUpdate, Progress};

/// Percentage reached once a named step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepThreshold {
    pub step: &'static str,
    pub percentage: u8,
}

const fn step(step: &'static str, percentage: u8) -> StepThreshold {
    StepThreshold { step, percentage }
}

// ── Avatar creation (3 steps) ───────────────────────────────────────────

pub const AVATAR_STEPS: &[StepThreshold] = &[
    step("avatar_validation", 30),
    step("avatar_generation", 70),
    step("persist_result", 100),
];

// ── Virtual try-on (4 steps) ────────────────────────────────────────────

pub const TRYON_STEPS: &[StepThreshold] = &[
    step("avatar_validation", 25),
    step("image_synthesis", 60),
    step("video_generation", 85),
    step("persist_result", 100),
];

/// Coarse percentage used when a record carries no step metadata.
const COARSE_PROCESSING: u8 = 50;

/// Stage label once every step has completed.
const STAGE_COMPLETED: &str = "completed";

pub fn thresholds(kind: JobKind) -> &'static [StepThreshold] {
    match kind {
        JobKind::AvatarCreation => AVATAR_STEPS,
        JobKind::VirtualTryon => TRYON_STEPS,
    }
}

/// Derive the canonical progress for a raw record.
///
/// With step metadata the percentage is the highest threshold whose step is
/// completed and the stage is the first step not yet completed. Without it
/// (or with an empty map) the coarse `status` mapping applies. A completed
/// record always reports 100.
pub fn aggregate(kind: JobKind, record: &JobRecord) -> Progress {
    if record.status == JobStatus::Completed {
        return Progress {
            percentage: 100,
            stage: STAGE_COMPLETED.to_string(),
        };
    }

    match record.step_metadata.as_ref().filter(|steps| !steps.is_empty()) {
        Some(steps) => from_steps(thresholds(kind), steps),
        None => from_status(&record.status),
    }
}

fn from_steps(table: &[StepThreshold], steps: &StepMetadata) -> Progress {
    let is_done = |t: &StepThreshold| steps.get(t.step) == Some(&StepStatus::Completed);

    let percentage = table
        .iter()
        .filter(|&t| is_done(t))
        .map(|t| t.percentage)
        .max()
        .unwrap_or(0);

    let stage = table
        .iter()
        .find(|&t| !is_done(t))
        .map(|t| t.step)
        .unwrap_or(STAGE_COMPLETED);

    Progress {
        percentage,
        stage: stage.to_string(),
    }
}

/// Unfamiliar statuses report 0 with the raw status as the stage.
fn from_status(status: &JobStatus) -> Progress {
    let percentage = match status {
        JobStatus::Processing => COARSE_PROCESSING,
        JobStatus::Completed => 100,
        _ => 0,
    };
    Progress {
        percentage,
        stage: status.to_string(),
    }
}

/// Step names present in the metadata that the kind's table does not know.
pub fn unmapped_steps<'a>(kind: JobKind, steps: &'a StepMetadata) -> Vec<&'a str> {
    let table = thresholds(kind);
    steps
        .keys()
        .map(String::as_str)
        .filter(|name| !table.iter().any(|t| t.step == *name))
        .collect()
}

/// Build the consumer-facing update for a fetched or pushed record.
///
/// `result` is only carried on completion and `error_message` only on
/// failure. Unknown step names are logged since they never move progress.
pub fn build_update(kind: JobKind, job_id: &JobId, record: &JobRecord) -> JobUpdate {
    if let Some(steps) = &record.step_metadata {
        let unknown = unmapped_steps(kind, steps);
        if !unknown.is_empty() {
            tracing::warn!(
                job_id = %job_id,
                kind = %kind,
                steps = ?unknown,
                "Unmapped pipeline steps ignored by progress table"
            );
        }
    }

    let progress = aggregate(kind, record);

    let result = match record.status {
        JobStatus::Completed => Some(record.result.clone().unwrap_or_default()),
        _ => None,
    };

    let error_message = match record.status {
        JobStatus::Failed => Some(
            record
                .error_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Processing failed".to_string()),
        ),
        _ => None,
    };

    JobUpdate {
        job_id: job_id.clone(),
        kind,
        status: record.status.clone(),
        percentage: progress.percentage,
        stage: progress.stage,
        result,
        error_message,
    }
}
