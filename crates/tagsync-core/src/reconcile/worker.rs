use std::sync::Arc;

use tagsync_model::{ReconcileRequest, RetryStrategy, TagKey};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{Outcome, ReconcileState, Reconciler, RetryBudget};
use crate::{
    leader::LeaderGate,
    metrics::{MetricsHandle, noop_metrics},
    queue::WorkQueue,
};

/// One member of the worker pool.
///
/// Drains the queue only while the leader gate is open, settles each request through the
/// [`Reconciler`] and applies the retry discipline.
pub struct Worker {
    id: usize,
    queue: Arc<WorkQueue>,
    reconciler: Arc<Reconciler>,
    gate: Arc<LeaderGate>,
    retry: RetryStrategy,
    catalog_miss_retries: u32,
    metrics: MetricsHandle,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<WorkQueue>,
        reconciler: Arc<Reconciler>,
        gate: Arc<LeaderGate>,
        retry: RetryStrategy,
        catalog_miss_retries: u32,
    ) -> Self {
        Self {
            id,
            queue,
            reconciler,
            gate,
            retry,
            catalog_miss_retries,
            metrics: noop_metrics(),
        }
    }

    /// Replace the metrics backend and return updated worker.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Process requests until cancelled or the queue shuts down.
    ///
    /// A request being processed when cancellation arrives is finished first.
    pub async fn run(&self, cancel: CancellationToken) {
        debug!(worker = self.id, "worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.gate.wait_for_leadership() => {}
            }

            let req = tokio::select! {
                _ = cancel.cancelled() => break,
                req = self.queue.get() => match req {
                    Some(req) => req,
                    None => break,
                },
            };

            if !self.gate.is_leader() {
                self.queue.done(&req.key);
                self.queue.add(req);
                continue;
            }
            self.process(req).await;
        }
        debug!(worker = self.id, "worker stopped");
    }

    /// Settle one dequeued request and release its key.
    #[instrument(level = "debug", skip(self, req), fields(worker = self.id, tag = %req.key))]
    pub async fn process(&self, req: ReconcileRequest) -> ReconcileState {
        let started = Instant::now();
        let key = req.key.clone();

        let mut launched = self.queue.launched(&key);
        let state = match self.reconciler.reconcile_with(&req, &mut launched).await {
            Outcome::Retry { budget, reason } => {
                self.queue.record_launched(&key, launched);
                self.schedule_retry(&key, budget, &reason)
            }
            Outcome::Failed(reason) => {
                let attempts = self.queue.retries(&key, RetryBudget::Transient) + 1;
                self.queue.forget(&key);
                error!(tag = %key, attempts, %reason, "launch rejected permanently");
                ReconcileState::PermanentlyFailed
            }
            outcome => {
                self.queue.forget(&key);
                outcome.state()
            }
        };

        self.queue.done(&key);
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.record_reconcile(state, elapsed);
        self.metrics.set_queue_depth(self.queue.len());
        debug!(state = %state, duration_ms = elapsed, "request settled");
        state
    }

    fn schedule_retry(&self, key: &TagKey, budget: RetryBudget, reason: &str) -> ReconcileState {
        let attempt = self.queue.record_retry(key, budget);

        match budget {
            RetryBudget::Transient if self.retry.exhausted(attempt) => {
                self.queue.forget(key);
                error!(tag = %key, attempts = attempt, %reason, "retries exhausted; giving up until next resync");
                return ReconcileState::PermanentlyFailed;
            }
            RetryBudget::CatalogLag if attempt > self.catalog_miss_retries => {
                self.queue.forget(key);
                info!(tag = %key, attempts = attempt, "catalog entry never appeared; skipping");
                return ReconcileState::Skipped;
            }
            _ => {}
        }

        let delay = self.retry.delay(attempt);
        warn!(
            tag = %key,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            %reason,
            "reconcile will be retried"
        );
        self.queue.retry_after(key.clone(), delay);
        ReconcileState::Retrying
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::LaunchError;
    use crate::testing::{Fixture, RecordingLauncher, catalog_entry, tag_info, tag_key};
    use std::time::Duration;
    use tagsync_model::EnqueueReason;

    fn strategy() -> RetryStrategy {
        RetryStrategy {
            max_attempts: 4,
            first_ms: 1_000,
            max_ms: 60_000,
            factor: 2.0,
        }
    }

    async fn live_fixture() -> Fixture {
        let fx = Fixture::live()
            .with_catalog(vec![catalog_entry("acme", "widgets", "main", &["unit-tests"])])
            .await;
        fx.tags.upsert(tag_info("v2", "acme", "widgets", "main"));
        fx
    }

    async fn drain(queue: &WorkQueue, worker: &Worker) -> Vec<ReconcileState> {
        let mut states = Vec::new();
        loop {
            let req = match tokio::time::timeout(Duration::from_secs(600), queue.get()).await {
                Ok(Some(req)) => req,
                _ => return states,
            };
            let state = worker.process(req).await;
            states.push(state);
            if state.is_terminal() {
                return states;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_back_off_then_fail_permanently() {
        let fx = live_fixture().await;
        for _ in 0..10 {
            fx.launcher.push_result(Err(LaunchError::Transient("backend unavailable".into())));
        }
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 3);

        queue.add(ReconcileRequest::event(tag_key("v2")));
        let states = drain(&queue, &worker).await;

        assert_eq!(
            states,
            vec![
                ReconcileState::Retrying,
                ReconcileState::Retrying,
                ReconcileState::Retrying,
                ReconcileState::PermanentlyFailed,
            ]
        );
        assert_eq!(fx.launcher.count(), 4);

        let times = fx.launcher.call_times();
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        let expected = [1, 2, 4].map(Duration::from_secs);
        assert_eq!(gaps.len(), expected.len());
        for (gap, want) in gaps.iter().zip(expected) {
            assert!(*gap >= want && *gap < want + Duration::from_millis(10), "gap {gap:?}, want {want:?}");
        }
        assert!(gaps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(queue.retries(&tag_key("v2"), RetryBudget::Transient), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_after_transient_failure_succeeds() {
        let fx = live_fixture().await;
        fx.launcher.push_result(Err(LaunchError::Timeout(Duration::from_secs(30))));
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 3);

        queue.add(ReconcileRequest::event(tag_key("v2")));
        let states = drain(&queue, &worker).await;

        assert_eq!(states, vec![ReconcileState::Retrying, ReconcileState::Succeeded]);
        assert_eq!(fx.launcher.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let fx = live_fixture().await;
        fx.launcher.push_result(Err(LaunchError::Permanent("bad definition".into())));
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 3);

        queue.add(ReconcileRequest::event(tag_key("v2")));

        assert_eq!(drain(&queue, &worker).await, vec![ReconcileState::PermanentlyFailed]);
        assert_eq!(fx.launcher.count(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_lag_retries_are_bounded() {
        let fx = Fixture::live().with_catalog(vec![]).await;
        fx.tags.upsert(
            tag_info("v2", "acme", "widgets", "main").with_created_ms(crate::clock::unix_ms()),
        );
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 2);

        queue.add(ReconcileRequest::event(tag_key("v2")));
        let states = drain(&queue, &worker).await;

        assert_eq!(
            states,
            vec![ReconcileState::Retrying, ReconcileState::Retrying, ReconcileState::Skipped]
        );
        assert_eq!(fx.launcher.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_arriving_within_grace_launches() {
        let fx = Fixture::live().with_catalog(vec![]).await;
        fx.tags.upsert(
            tag_info("v2", "acme", "widgets", "main").with_created_ms(crate::clock::unix_ms()),
        );
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 3);

        queue.add(ReconcileRequest::event(tag_key("v2")));
        let first = queue.get().await.unwrap();
        assert_eq!(worker.process(first).await, ReconcileState::Retrying);

        fx.source
            .set_entries(vec![catalog_entry("acme", "widgets", "main", &["unit-tests"])]);
        fx.cache.reload().await.unwrap();

        let retry = queue.get().await.unwrap();
        assert_eq!(retry.reason, EnqueueReason::Retry);
        assert_eq!(worker.process(retry).await, ReconcileState::Succeeded);
        assert_eq!(fx.launcher.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_enqueues_settle_into_one_launch() {
        let fx = live_fixture().await;
        let queue = Arc::new(WorkQueue::new());

        let adders: Vec<_> = (0..5)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.add(ReconcileRequest::event(tag_key("v2"))) })
            })
            .collect();
        for adder in adders {
            adder.await.unwrap();
        }

        let cancel = CancellationToken::new();
        let workers: Vec<_> = (0..3)
            .map(|i| {
                let worker = fx.worker_with_id(i, &queue, strategy(), 3);
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        for w in workers {
            w.await.unwrap();
        }

        assert_eq!(fx.launcher.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn workers_stay_idle_without_leadership() {
        let fx = live_fixture().await;
        fx.gate.set(false);
        let queue = Arc::new(WorkQueue::new());
        queue.add(ReconcileRequest::event(tag_key("v2")));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let worker = fx.worker(&queue, strategy(), 3);
            let cancel = cancel.clone();
            async move { worker.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fx.launcher.count(), 0);
        assert_eq!(queue.len(), 1);

        fx.gate.set(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fx.launcher.count(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_lag_does_not_spend_launch_retries() {
        let fx = Fixture::live().with_catalog(vec![]).await;
        fx.tags.upsert(
            tag_info("v2", "acme", "widgets", "main").with_created_ms(crate::clock::unix_ms()),
        );
        for _ in 0..10 {
            fx.launcher.push_result(Err(LaunchError::Transient("backend unavailable".into())));
        }
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 3);

        queue.add(ReconcileRequest::event(tag_key("v2")));
        for _ in 0..3 {
            let req = queue.get().await.unwrap();
            assert_eq!(worker.process(req).await, ReconcileState::Retrying);
        }
        assert_eq!(fx.launcher.count(), 0);

        fx.source
            .set_entries(vec![catalog_entry("acme", "widgets", "main", &["unit-tests"])]);
        fx.cache.reload().await.unwrap();
        let states = drain(&queue, &worker).await;

        assert_eq!(
            states,
            vec![
                ReconcileState::Retrying,
                ReconcileState::Retrying,
                ReconcileState::Retrying,
                ReconcileState::PermanentlyFailed,
            ]
        );
        assert_eq!(fx.launcher.count(), 4);

        let times = fx.launcher.call_times();
        let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
        for (gap, want) in gaps.iter().zip([1, 2, 4].map(Duration::from_secs)) {
            assert!(*gap >= want && *gap < want + Duration::from_millis(10), "gap {gap:?}, want {want:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resync_during_backoff_waits_for_the_retry() {
        let fx = live_fixture().await;
        fx.launcher.push_result(Err(LaunchError::Transient("backend unavailable".into())));
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 3);

        queue.add(ReconcileRequest::event(tag_key("v2")));
        let first = queue.get().await.unwrap();
        assert_eq!(worker.process(first).await, ReconcileState::Retrying);

        assert!(!queue.add(ReconcileRequest::resync(tag_key("v2"))));
        assert!(queue.try_get().is_none());

        let retry = queue.get().await.unwrap();
        assert_eq!(retry.reason, EnqueueReason::Retry);
        assert_eq!(worker.process(retry).await, ReconcileState::Succeeded);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(queue.try_get().is_none());
        assert_eq!(fx.launcher.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_launches_only_outstanding_jobs() {
        let fx = Fixture::live()
            .with_catalog(vec![catalog_entry("acme", "widgets", "main", &["build", "unit-tests"])])
            .await;
        fx.tags.upsert(tag_info("v2", "acme", "widgets", "main"));
        fx.launcher.push_result(Ok(()));
        fx.launcher.push_result(Err(LaunchError::Transient("rate limited".into())));
        let queue = Arc::new(WorkQueue::new());
        let worker = fx.worker(&queue, strategy(), 3);

        queue.add(ReconcileRequest::event(tag_key("v2")));
        let states = drain(&queue, &worker).await;

        assert_eq!(states, vec![ReconcileState::Retrying, ReconcileState::Succeeded]);
        let jobs: Vec<String> = fx.launcher.calls().into_iter().map(|s| s.job).collect();
        assert_eq!(jobs, vec!["build", "unit-tests", "unit-tests"]);
        assert!(queue.launched(&tag_key("v2")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn enqueues_while_in_flight_collapse_into_one_follow_up() {
        let fx = Fixture::live()
            .with_launcher(RecordingLauncher::new().with_delay(Duration::from_secs(1)))
            .with_catalog(vec![catalog_entry("acme", "widgets", "main", &["unit-tests"])])
            .await;
        fx.tags.upsert(tag_info("v2", "acme", "widgets", "main"));
        let queue = Arc::new(WorkQueue::new());

        let cancel = CancellationToken::new();
        let workers: Vec<_> = (0..3)
            .map(|i| {
                let worker = fx.worker_with_id(i, &queue, strategy(), 3);
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect();

        queue.add(ReconcileRequest::event(tag_key("v2")));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.processing_len(), 1);

        let adders: Vec<_> = (0..5)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.add(ReconcileRequest::event(tag_key("v2"))) })
            })
            .collect();
        for adder in adders {
            adder.await.unwrap();
        }
        assert_eq!(fx.launcher.count(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
        for w in workers {
            w.await.unwrap();
        }

        // The in-flight reconcile plus a single follow-up for the five changes seen meanwhile.
        assert_eq!(fx.launcher.count(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.processing_len(), 0);
    }
}
