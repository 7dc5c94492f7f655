//! Status polling.
//!
//! One task per tracked job. Each tick fetches the record, aggregates it and
//! hands the result to the consumer callback. Ticks are spaced by a fixed
//! delay after each fetch completes, so a slow store never sees overlapping
//! requests for the same job.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::job::{JobId, JobKind, JobStatus};
use crate::models::update::JobUpdate;
use crate::services::job_store::JobStore;
use crate::services::progress;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Fetch budget; failed fetches count too.
    pub max_attempts: u32,
    /// Delay between the end of one fetch and the start of the next.
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// How a polling session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

/// Handle to a spawned polling session.
///
/// Dropping the handle detaches the session; call [`PollHandle::cancel`] to
/// stop it.
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// No callback fires after this returns.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// A session whose task panicked reports `Cancelled`.
    pub async fn join(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Polling task did not finish cleanly");
                PollOutcome::Cancelled
            }
        }
    }
}

pub struct StatusPoller {
    store: Arc<dyn JobStore>,
    options: PollOptions,
}

impl StatusPoller {
    pub fn new(store: Arc<dyn JobStore>, options: PollOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    /// Spawn a polling session with the default options.
    pub fn poll<F>(&self, kind: JobKind, id: JobId, on_update: F) -> PollHandle
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        self.poll_with(kind, id, self.options, CancellationToken::new(), on_update)
    }

    /// Spawn a polling session stopped by `token` or by the returned handle.
    pub fn poll_with<F>(
        &self,
        kind: JobKind,
        id: JobId,
        options: PollOptions,
        token: CancellationToken,
        on_update: F,
    ) -> PollHandle
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            run_session(store.as_ref(), kind, &id, options, &task_token, on_update).await
        });
        PollHandle { token, task }
    }

    /// Drive one polling session to its end on the current task.
    pub async fn run<F>(
        &self,
        kind: JobKind,
        id: &JobId,
        token: &CancellationToken,
        on_update: F,
    ) -> PollOutcome
    where
        F: FnMut(JobUpdate),
    {
        run_session(self.store.as_ref(), kind, id, self.options, token, on_update).await
    }
}

async fn run_session<F>(
    store: &dyn JobStore,
    kind: JobKind,
    id: &JobId,
    options: PollOptions,
    token: &CancellationToken,
    mut on_update: F,
) -> PollOutcome
where
    F: FnMut(JobUpdate),
{
    if id.is_synthetic() {
        tracing::debug!(job_id = %id, kind = %kind, "Synthetic job, skipping poll");
        if token.is_cancelled() {
            return PollOutcome::Cancelled;
        }
        on_update(JobUpdate::synthetic_completion(kind, id.clone()));
        return PollOutcome::Completed;
    }

    let mut last_percentage = 0u8;

    for attempt in 1..=options.max_attempts {
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return PollOutcome::Cancelled,
            fetched = store.fetch_status(kind, id) => fetched,
        };

        if token.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        match fetched {
            Ok(Some(record)) => {
                let mut update = progress::build_update(kind, id, &record);
                if update.percentage < last_percentage {
                    tracing::warn!(
                        job_id = %id,
                        reported = update.percentage,
                        previous = last_percentage,
                        "Progress regressed, keeping previous percentage"
                    );
                    update.percentage = last_percentage;
                }
                last_percentage = update.percentage;

                tracing::debug!(
                    job_id = %id,
                    attempt,
                    status = %update.status,
                    percentage = update.percentage,
                    stage = %update.stage,
                    "Job status fetched"
                );

                let finished = match update.status {
                    JobStatus::Completed => Some(PollOutcome::Completed),
                    JobStatus::Failed => Some(PollOutcome::Failed),
                    JobStatus::Timeout => Some(PollOutcome::TimedOut),
                    _ => None,
                };
                on_update(update);

                if let Some(outcome) = finished {
                    return outcome;
                }
            }
            Ok(None) => {
                tracing::debug!(job_id = %id, attempt, "Job not visible yet");
            }
            Err(e) => {
                tracing::warn!(job_id = %id, attempt, error = %e, "Status fetch failed, will retry");
            }
        }

        if attempt < options.max_attempts {
            tokio::select! {
                biased;
                _ = token.cancelled() => return PollOutcome::Cancelled,
                _ = tokio::time::sleep(options.interval) => {}
            }
        }
    }

    if token.is_cancelled() {
        return PollOutcome::Cancelled;
    }

    tracing::warn!(
        job_id = %id,
        kind = %kind,
        attempts = options.max_attempts,
        "Polling budget exhausted without a terminal status"
    );
    metrics::counter!("tryon_jobs_poll_timeouts_total", "kind" => kind.to_string()).increment(1);

    on_update(JobUpdate::timed_out(kind, id.clone(), last_percentage));
    PollOutcome::TimedOut
}
