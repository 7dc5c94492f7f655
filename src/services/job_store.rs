use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::models::job::{JobId, JobKind, JobRecord};

/// Read-only view onto the remote job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch the current record. `Ok(None)` means the job is not visible yet.
    async fn fetch_status(&self, kind: JobKind, id: &JobId)
        -> Result<Option<JobRecord>, StoreError>;
}

/// Job store backed by the hosted database's REST interface.
pub struct RestJobStore {
    http: Client,
    base_url: String,
    api_key: String,
}

impl RestJobStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn record_url(&self, kind: JobKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.table())
    }
}

#[async_trait]
impl JobStore for RestJobStore {
    async fn fetch_status(
        &self,
        kind: JobKind,
        id: &JobId,
    ) -> Result<Option<JobRecord>, StoreError> {
        let filter = format!("eq.{}", id);
        let response = self
            .http
            .get(self.record_url(kind))
            .query(&[("id", filter.as_str()), ("select", "*")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_rows(&body)
    }
}

/// First record of a REST row-set body; an empty set means not visible yet.
pub fn parse_rows(body: &str) -> Result<Option<JobRecord>, StoreError> {
    let mut rows: Vec<JobRecord> = serde_json::from_str(body)?;
    Ok(if rows.is_empty() {
        None
    } else {
        Some(rows.swap_remove(0))
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Job store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse job record: {0}")]
    Parse(#[from] serde_json::Error),
}
