//! In-memory collaborators for exercising polling, submission and push
//! delivery without a live backend.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::time::Instant;

use tryon_jobs::models::job::{JobHandle, JobId, JobKind, JobRecord};
use tryon_jobs::models::payload::SubmitPayload;
use tryon_jobs::models::update::JobUpdate;
use tryon_jobs::services::gateway::{BackendError, SubmissionBackend};
use tryon_jobs::services::job_store::{parse_rows, JobStore, StoreError};
use tryon_jobs::services::realtime::{ChangeFeed, FeedError, RecordStream};

// ── Job store ───────────────────────────────────────────────────────────

/// One scripted response from the fake job store.
pub enum Reply {
    Record(JobRecord),
    /// Raw REST body, parsed the way the hosted store parses it.
    Body(&'static str),
    NotFound,
    Unreachable,
}

/// Job store that replays a script, repeating the last reply once the
/// script runs out.
pub struct ScriptedStore {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<JobRecord>>,
    fetches: AtomicUsize,
    fetch_times: Mutex<Vec<Instant>>,
    latency: Duration,
}

impl ScriptedStore {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            fetch_times: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Start time of every fetch, in order.
    pub fn fetch_times(&self) -> Vec<Instant> {
        self.fetch_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for ScriptedStore {
    async fn fetch_status(
        &self,
        _kind: JobKind,
        _id: &JobId,
    ) -> Result<Option<JobRecord>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_times.lock().unwrap().push(Instant::now());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Reply::Record(record)) => {
                *self.last.lock().unwrap() = Some(record.clone());
                Ok(Some(record))
            }
            Some(Reply::Body(body)) => {
                let record = parse_rows(body)?;
                *self.last.lock().unwrap() = record.clone();
                Ok(record)
            }
            Some(Reply::NotFound) => Ok(None),
            Some(Reply::Unreachable) => Err(StoreError::Status {
                status: 503,
                body: "upstream connect error".to_string(),
            }),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

// ── Submission backends ─────────────────────────────────────────────────

#[derive(Clone, Copy)]
pub enum Behavior {
    Accept,
    Unreachable,
    Unauthorized,
    Reject,
}

/// Backend that records every payload it receives.
pub struct RecordingBackend {
    name: String,
    behavior: Behavior,
    received: Mutex<Vec<serde_json::Value>>,
}

impl RecordingBackend {
    pub fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behavior,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<serde_json::Value> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionBackend for RecordingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(
        &self,
        _kind: JobKind,
        payload: &SubmitPayload,
    ) -> Result<JobHandle, BackendError> {
        self.received
            .lock()
            .unwrap()
            .push(serde_json::to_value(payload).unwrap());

        match self.behavior {
            Behavior::Accept => Ok(JobHandle {
                id: JobId::new(format!("{}-job-{}", self.name, self.calls())),
            }),
            Behavior::Unreachable => Err(BackendError::Transport("connection refused".to_string())),
            Behavior::Unauthorized => Err(BackendError::Unauthorized("invalid JWT".to_string())),
            Behavior::Reject => Err(BackendError::Rejected {
                status: 422,
                message: "avatar_id does not belong to user".to_string(),
            }),
        }
    }
}

// ── Change feed ─────────────────────────────────────────────────────────

/// Change feed whose events are pushed by the test.
pub struct ChannelFeed {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Result<JobRecord, FeedError>>>>,
    subscriptions: AtomicUsize,
    fail_connect: bool,
}

impl ChannelFeed {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<JobRecord, FeedError>>) {
        let (tx, rx) = mpsc::unbounded();
        let feed = Arc::new(Self {
            receiver: Mutex::new(Some(rx)),
            subscriptions: AtomicUsize::new(0),
            fail_connect: false,
        });
        (feed, tx)
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            receiver: Mutex::new(None),
            subscriptions: AtomicUsize::new(0),
            fail_connect: true,
        })
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn subscribe_to_changes(
        &self,
        _kind: JobKind,
        _id: &JobId,
    ) -> Result<RecordStream, FeedError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(FeedError::Connect("handshake refused".to_string()));
        }
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| FeedError::Connect("already subscribed".to_string()))?;
        Ok(receiver.boxed())
    }
}

// ── Consumer ────────────────────────────────────────────────────────────

/// Collects every update a consumer callback receives.
#[derive(Clone, Default)]
pub struct Recorder {
    updates: Arc<Mutex<Vec<JobUpdate>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl FnMut(JobUpdate) + Send + 'static {
        let updates = Arc::clone(&self.updates);
        move |update| updates.lock().unwrap().push(update)
    }

    pub fn updates(&self) -> Vec<JobUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn percentages(&self) -> Vec<u8> {
        self.updates().iter().map(|u| u.percentage).collect()
    }
}
