use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::services::{
    gateway::{BackendError, JobGateway, SubmissionBackend},
    job_store::{JobStore, RestJobStore, StoreError},
    pipeline::{HttpPipelineBackend, OfflineBackend},
    poller::StatusPoller,
    realtime::{RealtimeSubscriber, WebSocketChangeFeed},
    tracker::JobTracker,
};

/// Explicitly constructed services shared by every consumer flow.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<JobGateway>,
    pub poller: Arc<StatusPoller>,
    pub subscriber: Option<Arc<RealtimeSubscriber>>,
    pub tracker: Arc<JobTracker>,
}

impl AppState {
    pub fn new(
        gateway: JobGateway,
        poller: StatusPoller,
        subscriber: Option<RealtimeSubscriber>,
    ) -> Self {
        let poller = Arc::new(poller);
        let subscriber = subscriber.map(Arc::new);
        let tracker = Arc::new(JobTracker::new(Arc::clone(&poller), subscriber.clone()));
        Self {
            gateway: Arc::new(gateway),
            poller,
            subscriber,
            tracker,
        }
    }

    /// Same services with pushed updates disabled.
    pub fn without_realtime(self) -> Self {
        let tracker = Arc::new(JobTracker::new(Arc::clone(&self.poller), None));
        Self {
            subscriber: None,
            tracker,
            ..self
        }
    }

    /// Wire the production services from configuration.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, InitError> {
        let timeout = config.request_timeout();

        let gateway = if config.offline_mode {
            tracing::warn!("Offline mode: jobs are created locally and complete immediately");
            JobGateway::new(vec![Arc::new(OfflineBackend)])
        } else {
            let mut backends: Vec<Arc<dyn SubmissionBackend>> = vec![Arc::new(
                HttpPipelineBackend::new(
                    "edge",
                    &config.primary_pipeline_url(),
                    &config.backend_api_key,
                    timeout,
                )?,
            )];
            if let Some(url) = &config.fallback_pipeline_url {
                let token = config
                    .fallback_api_token
                    .as_deref()
                    .unwrap_or(&config.backend_api_key);
                backends.push(Arc::new(HttpPipelineBackend::new(
                    "pipeline", url, token, timeout,
                )?));
            }
            JobGateway::new(backends)
        };

        let store: Arc<dyn JobStore> = Arc::new(RestJobStore::new(
            &config.backend_url,
            &config.backend_api_key,
            timeout,
        )?);
        let poller = StatusPoller::new(store, config.poll_options());

        let subscriber = config.realtime_url.as_deref().map(|url| {
            RealtimeSubscriber::new(Arc::new(WebSocketChangeFeed::new(
                url,
                &config.backend_api_key,
            )))
        });

        tracing::info!(
            backends = ?gateway.backend_names(),
            realtime = subscriber.is_some(),
            "Job services initialized"
        );

        Ok(Self::new(gateway, poller, subscriber))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Failed to build submission backend: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to build job store client: {0}")]
    Store(#[from] StoreError),
}
