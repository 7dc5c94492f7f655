use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::job::{JobHandle, JobId, JobKind};
use crate::models::payload::SubmitPayload;
use crate::services::gateway::{BackendError, SubmissionBackend};

/// HTTP execution path for the remote processing pipelines.
///
/// Jobs are created with `POST {base_url}/{kind}`; the response carries the
/// new job id as `id` or `job_id`.
pub struct HttpPipelineBackend {
    name: String,
    http: Client,
    base_url: String,
    api_token: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(alias = "job_id", alias = "jobId")]
    id: String,
}

impl HttpPipelineBackend {
    pub fn new(
        name: &str,
        base_url: &str,
        api_token: &str,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    fn submit_url(&self, kind: JobKind) -> String {
        format!("{}/{}", self.base_url, kind)
    }
}

#[async_trait]
impl SubmissionBackend for HttpPipelineBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(
        &self,
        kind: JobKind,
        payload: &SubmitPayload,
    ) -> Result<JobHandle, BackendError> {
        let url = self.submit_url(kind);
        tracing::debug!(backend = %self.name, url = %url, "Submitting job");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        if body.id.trim().is_empty() {
            return Err(BackendError::Malformed("empty job id".to_string()));
        }

        Ok(JobHandle {
            id: JobId::new(body.id),
        })
    }
}

/// Map a non-success HTTP status onto the submission error taxonomy.
///
/// Statuses meaning the backend could not serve the request right now are
/// transport failures; anything else is a rejection of this request.
pub fn classify_status(status: StatusCode, body: String) -> BackendError {
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("no response body").to_string()
    } else {
        body
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            BackendError::Transport(format!("{}: {}", status.as_u16(), message))
        }
        s if s.is_server_error() => {
            BackendError::Transport(format!("{}: {}", status.as_u16(), message))
        }
        s => BackendError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

/// Local stand-in that mints synthetic job ids without any network call.
#[derive(Debug, Default)]
pub struct OfflineBackend;

#[async_trait]
impl SubmissionBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn submit(
        &self,
        kind: JobKind,
        _payload: &SubmitPayload,
    ) -> Result<JobHandle, BackendError> {
        let id = JobId::new(format!("local-{}", Uuid::new_v4()));
        tracing::info!(job_id = %id, kind = %kind, "Created offline job");
        Ok(JobHandle { id })
    }
}
