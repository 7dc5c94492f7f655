//! Job submission with ordered backend fallback.
//!
//! Backends are tried in order. Only transport failures advance to the next
//! backend; a backend that answers and rejects the request ends submission.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::job::{JobHandle, JobKind};
use crate::models::payload::SubmitPayload;

/// One execution path able to create a remote job.
#[async_trait]
pub trait SubmissionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, kind: JobKind, payload: &SubmitPayload)
        -> Result<JobHandle, BackendError>;
}

/// Picks a backend for each new job.
pub struct JobGateway {
    backends: Vec<Arc<dyn SubmissionBackend>>,
}

impl JobGateway {
    pub fn new(backends: Vec<Arc<dyn SubmissionBackend>>) -> Self {
        Self { backends }
    }

    pub fn with_fallback(
        primary: Arc<dyn SubmissionBackend>,
        fallback: Arc<dyn SubmissionBackend>,
    ) -> Self {
        Self::new(vec![primary, fallback])
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Submit a new job. Every call creates a new remote job.
    pub async fn submit(
        &self,
        kind: JobKind,
        payload: &SubmitPayload,
    ) -> Result<JobHandle, SubmitError> {
        if payload.kind() != kind {
            return Err(SubmitError::KindMismatch {
                expected: kind,
                actual: payload.kind(),
            });
        }
        payload.validate().map_err(SubmitError::Invalid)?;

        let mut last_error = None;

        for (index, backend) in self.backends.iter().enumerate() {
            if index > 0 {
                metrics::counter!("tryon_jobs_submit_fallbacks_total", "kind" => kind.to_string())
                    .increment(1);
                tracing::info!(kind = %kind, backend = backend.name(), "Falling back to next backend");
            }

            match backend.submit(kind, payload).await {
                Ok(handle) => {
                    metrics::counter!(
                        "tryon_jobs_submitted_total",
                        "kind" => kind.to_string(),
                        "backend" => backend.name().to_string()
                    )
                    .increment(1);
                    tracing::info!(
                        job_id = %handle.id,
                        kind = %kind,
                        backend = backend.name(),
                        "Job submitted"
                    );
                    return Ok(handle);
                }
                Err(BackendError::Transport(message)) => {
                    tracing::warn!(
                        kind = %kind,
                        backend = backend.name(),
                        error = %message,
                        "Backend unreachable"
                    );
                    last_error = Some(message);
                }
                Err(e) => {
                    tracing::error!(
                        kind = %kind,
                        backend = backend.name(),
                        error = %e,
                        "Submission rejected"
                    );
                    return Err(SubmitError::from_backend(backend.name(), e));
                }
            }
        }

        match last_error {
            Some(last_error) => Err(SubmitError::Unavailable { last_error }),
            None => Err(SubmitError::NoBackends),
        }
    }
}

/// Failure reported by a single backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Unreadable response from backend: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Whether another backend might succeed where this one failed.
    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Transport(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid payload: {0}")]
    Invalid(garde::Report),

    #[error("Payload is for {actual}, not {expected}")]
    KindMismatch { expected: JobKind, actual: JobKind },

    #[error("Backend {backend} refused authorization: {message}")]
    Unauthorized { backend: String, message: String },

    #[error("Backend {backend} rejected the job ({status}): {message}")]
    Rejected {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("Backend {backend} returned an unreadable response: {message}")]
    Malformed { backend: String, message: String },

    #[error("No backend reachable: {last_error}")]
    Unavailable { last_error: String },

    #[error("No submission backends configured")]
    NoBackends,
}

impl SubmitError {
    fn from_backend(backend: &str, error: BackendError) -> Self {
        let backend = backend.to_string();
        match error {
            BackendError::Unauthorized(message) => SubmitError::Unauthorized { backend, message },
            BackendError::Rejected { status, message } => SubmitError::Rejected {
                backend,
                status,
                message,
            },
            BackendError::Malformed(message) => SubmitError::Malformed { backend, message },
            BackendError::Transport(last_error) => SubmitError::Unavailable { last_error },
        }
    }

    /// Transport-only failures; the same request may be tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Unavailable { .. })
    }
}
