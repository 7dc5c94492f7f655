//! Push-based status delivery.
//!
//! Every change event for a job record is routed through the same progress
//! aggregation as polling, so consumers receive identical update shapes from
//! either path. Push is opportunistic: connection problems are logged, never
//! surfaced.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Url;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::models::job::{JobId, JobKind, JobRecord};
use crate::models::update::JobUpdate;
use crate::services::progress;

pub type RecordStream = BoxStream<'static, Result<JobRecord, FeedError>>;

/// Source of pushed job record changes.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe_to_changes(&self, kind: JobKind, id: &JobId)
        -> Result<RecordStream, FeedError>;
}

/// Change feed over a WebSocket channel keyed by job id.
pub struct WebSocketChangeFeed {
    base_url: String,
    api_key: String,
}

/// Text frames carry either the record itself or an envelope around it.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChangeEvent {
    Envelope { record: JobRecord },
    Bare(JobRecord),
}

impl ChangeEvent {
    fn into_record(self) -> JobRecord {
        match self {
            ChangeEvent::Envelope { record } | ChangeEvent::Bare(record) => record,
        }
    }
}

fn parse_event(bytes: &[u8]) -> Result<JobRecord, FeedError> {
    let event: ChangeEvent = serde_json::from_slice(bytes)?;
    Ok(event.into_record())
}

impl WebSocketChangeFeed {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn channel_url(&self, kind: JobKind, id: &JobId) -> Result<Url, FeedError> {
        let mut url = Url::parse(&format!("{}/{}/{}", self.base_url, kind.table(), id))
            .map_err(|e| FeedError::Connect(format!("invalid channel url: {e}")))?;
        url.query_pairs_mut().append_pair("apikey", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl ChangeFeed for WebSocketChangeFeed {
    async fn subscribe_to_changes(
        &self,
        kind: JobKind,
        id: &JobId,
    ) -> Result<RecordStream, FeedError> {
        let url = self.channel_url(kind, id)?;
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;

        tracing::debug!(job_id = %id, kind = %kind, "Change feed connected");

        let records = ws_stream.filter_map(|message| {
            let item = match message {
                Ok(Message::Text(text)) => Some(parse_event(text.as_bytes())),
                Ok(Message::Binary(bytes)) => Some(parse_event(&bytes)),
                Ok(_) => None,
                Err(e) => Some(Err(FeedError::Connect(e.to_string()))),
            };
            async move { item }
        });

        Ok(records.boxed())
    }
}

/// Handle to an active subscription.
pub struct Subscription {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery and release the underlying channel.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Subscription task did not finish cleanly");
        }
    }
}

pub struct RealtimeSubscriber {
    feed: Arc<dyn ChangeFeed>,
}

impl RealtimeSubscriber {
    pub fn new(feed: Arc<dyn ChangeFeed>) -> Self {
        Self { feed }
    }

    pub fn subscribe<F>(&self, kind: JobKind, id: JobId, on_update: F) -> Subscription
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        self.subscribe_with(kind, id, CancellationToken::new(), on_update)
    }

    /// Subscribe with a caller-provided token; cancelling it unsubscribes.
    pub fn subscribe_with<F>(
        &self,
        kind: JobKind,
        id: JobId,
        token: CancellationToken,
        mut on_update: F,
    ) -> Subscription
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        let feed = Arc::clone(&self.feed);
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            if id.is_synthetic() {
                if !task_token.is_cancelled() {
                    on_update(JobUpdate::synthetic_completion(kind, id));
                }
                return;
            }

            let connected = tokio::select! {
                biased;
                _ = task_token.cancelled() => return,
                connected = feed.subscribe_to_changes(kind, &id) => connected,
            };

            let mut records = match connected {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(job_id = %id, kind = %kind, error = %e, "Change feed unavailable");
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    next = records.next() => next,
                };

                match next {
                    Some(Ok(record)) => {
                        if task_token.is_cancelled() {
                            break;
                        }
                        let update = progress::build_update(kind, &id, &record);
                        let terminal = update.is_terminal();
                        on_update(update);
                        if terminal {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(job_id = %id, error = %e, "Ignoring bad change event");
                    }
                    None => {
                        tracing::debug!(job_id = %id, "Change feed ended");
                        break;
                    }
                }
            }
        });

        Subscription { token, task }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Change feed connection failed: {0}")]
    Connect(String),

    #[error("Failed to parse change event: {0}")]
    Parse(#[from] serde_json::Error),
}
