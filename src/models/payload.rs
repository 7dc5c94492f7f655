use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::JobKind;

/// Inputs for an avatar-creation job.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AvatarRequest {
    #[garde(length(min = 1, max = 200))]
    pub user_id: String,

    #[garde(length(min = 1))]
    pub source_image_url: String,

    #[garde(length(min = 1, max = 50))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
}

/// Inputs for a virtual try-on job.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TryOnRequest {
    #[garde(length(min = 1, max = 200))]
    pub user_id: String,

    #[garde(length(min = 1, max = 200))]
    pub avatar_id: String,

    #[garde(length(min = 1))]
    pub garment_image_url: String,

    #[garde(length(min = 1, max = 50))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garment_category: Option<String>,
}

/// Payload handed to a submission backend. Serializes as the inner request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitPayload {
    Avatar(AvatarRequest),
    TryOn(TryOnRequest),
}

impl SubmitPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            SubmitPayload::Avatar(_) => JobKind::AvatarCreation,
            SubmitPayload::TryOn(_) => JobKind::VirtualTryon,
        }
    }

    /// Checks required fields are present. Backends own every other rule.
    pub fn validate(&self) -> Result<(), garde::Report> {
        match self {
            SubmitPayload::Avatar(req) => req.validate(),
            SubmitPayload::TryOn(req) => req.validate(),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            SubmitPayload::Avatar(req) => &req.user_id,
            SubmitPayload::TryOn(req) => &req.user_id,
        }
    }
}

impl From<AvatarRequest> for SubmitPayload {
    fn from(value: AvatarRequest) -> Self {
        SubmitPayload::Avatar(value)
    }
}

impl From<TryOnRequest> for SubmitPayload {
    fn from(value: TryOnRequest) -> Self {
        SubmitPayload::TryOn(value)
    }
}
