use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::models::job::{JobId, JobKind};
use crate::models::update::JobUpdate;
use crate::services::merge::UpdateMerger;
use crate::services::poller::{PollHandle, PollOptions, StatusPoller};
use crate::services::realtime::{RealtimeSubscriber, Subscription};

/// Tracks a job through polling and, when available, pushed changes,
/// delivering one merged update stream to a single consumer callback.
pub struct JobTracker {
    poller: Arc<StatusPoller>,
    subscriber: Option<Arc<RealtimeSubscriber>>,
}

/// Active tracking session. Dropping it does not stop tracking.
pub struct Tracking {
    token: CancellationToken,
    poll: PollHandle,
    subscription: Option<Subscription>,
}

impl Tracking {
    /// Stop both delivery paths.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until both delivery paths have ended.
    pub async fn finished(self) {
        self.poll.join().await;
        if let Some(subscription) = self.subscription {
            subscription.join().await;
        }
    }
}

impl JobTracker {
    pub fn new(poller: Arc<StatusPoller>, subscriber: Option<Arc<RealtimeSubscriber>>) -> Self {
        Self { poller, subscriber }
    }

    pub fn track<F>(&self, kind: JobKind, id: JobId, on_update: F) -> Tracking
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        self.track_with(kind, id, self.poller.options(), on_update)
    }

    pub fn track_with<F>(
        &self,
        kind: JobKind,
        id: JobId,
        options: PollOptions,
        on_update: F,
    ) -> Tracking
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        let token = CancellationToken::new();
        let sink = MergedSink::new(on_update, token.clone());

        let poll = {
            let sink = sink.clone();
            self.poller
                .poll_with(kind, id.clone(), options, token.child_token(), move |u| sink.deliver(u))
        };

        // Synthetic ids complete through the poller alone.
        let subscription = match &self.subscriber {
            Some(subscriber) if !id.is_synthetic() => {
                let sink = sink.clone();
                Some(subscriber.subscribe_with(kind, id, token.child_token(), move |u| {
                    sink.deliver(u)
                }))
            }
            _ => None,
        };

        Tracking {
            token,
            poll,
            subscription,
        }
    }
}

/// Shared consumer end of both delivery paths.
struct MergedSink<F> {
    inner: Arc<Mutex<SinkState<F>>>,
    token: CancellationToken,
}

struct SinkState<F> {
    merger: UpdateMerger,
    on_update: F,
}

impl<F> Clone for MergedSink<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            token: self.token.clone(),
        }
    }
}

impl<F: FnMut(JobUpdate)> MergedSink<F> {
    fn new(on_update: F, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkState {
                merger: UpdateMerger::new(),
                on_update,
            })),
            token,
        }
    }

    fn deliver(&self, update: JobUpdate) {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.token.is_cancelled() {
            return;
        }

        if let Some(update) = state.merger.offer(update) {
            let terminal = update.is_terminal();
            (state.on_update)(update);
            if terminal {
                self.token.cancel();
            }
        }
    }
}
