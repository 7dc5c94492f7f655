//! Job records as the remote pipelines report them.

#![allow(dead_code)]

use tryon_jobs::models::job::{JobRecord, JobStatus, OutputKind, OutputRef, StepStatus};
use tryon_jobs::models::payload::{AvatarRequest, SubmitPayload, TryOnRequest};

pub const TRYON_STEPS: [&str; 4] = [
    "avatar_validation",
    "image_synthesis",
    "video_generation",
    "persist_result",
];

pub fn pending() -> JobRecord {
    JobRecord::with_status(JobStatus::Pending)
}

pub fn processing() -> JobRecord {
    JobRecord::with_status(JobStatus::Processing)
}

/// A processing try-on record with the first `done` steps completed and the
/// next one in progress.
pub fn tryon_progress(done: usize) -> JobRecord {
    let mut record = processing();
    record.step_metadata = Some(
        TRYON_STEPS
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let status = if i < done {
                    StepStatus::Completed
                } else if i == done {
                    StepStatus::Processing
                } else {
                    StepStatus::Pending
                };
                (step.to_string(), status)
            })
            .collect(),
    );
    record
}

pub fn completed() -> JobRecord {
    let mut record = JobRecord::with_status(JobStatus::Completed);
    record.result = Some(vec![
        OutputRef {
            kind: OutputKind::Image,
            url: "https://cdn.example.com/tryon/result.png".to_string(),
        },
        OutputRef {
            kind: OutputKind::Video,
            url: "https://cdn.example.com/tryon/result.mp4".to_string(),
        },
    ]);
    record
}

pub fn failed(message: &str) -> JobRecord {
    let mut record = JobRecord::with_status(JobStatus::Failed);
    record.error_message = Some(message.to_string());
    record
}

pub fn avatar_payload() -> SubmitPayload {
    SubmitPayload::from(AvatarRequest {
        user_id: "user-42".to_string(),
        source_image_url: "https://cdn.example.com/uploads/selfie.jpg".to_string(),
        body_type: Some("athletic".to_string()),
    })
}

pub fn tryon_payload() -> SubmitPayload {
    SubmitPayload::from(TryOnRequest {
        user_id: "user-42".to_string(),
        avatar_id: "avatar-7".to_string(),
        garment_image_url: "https://cdn.example.com/garments/denim-jacket.png".to_string(),
        garment_category: Some("upper_body".to_string()),
    })
}
