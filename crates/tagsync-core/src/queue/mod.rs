//! Deduplicating work queue.
//!
//! A key is in at most one of three places: the pending set (waiting in FIFO order), the
//! processing set (held by a worker) or backoff (a retry is scheduled). Adding a key that is
//! already pending or in backoff is a no-op; adding a key that is being processed marks it
//! dirty so it is queued again once the worker calls [`WorkQueue::done`]. This keeps at most one
//! worker on any key.
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tagsync_model::{JobSpec, ReconcileRequest, TagKey};
use tokio::sync::Notify;

use crate::reconcile::RetryBudget;

/// Retry accounting of one key until it settles.
#[derive(Debug, Default)]
struct RetryState {
    transient: u32,
    catalog_lag: u32,
    /// Jobs already launched by earlier attempts.
    launched: Vec<JobSpec>,
    /// Token of the scheduled retry; `None` while no retry is waiting.
    scheduled: Option<u64>,
}

#[derive(Default)]
struct Inner {
    order: VecDeque<TagKey>,
    pending: HashMap<TagKey, ReconcileRequest>,
    processing: HashSet<TagKey>,
    retries: HashMap<TagKey, RetryState>,
    next_token: u64,
    shutting_down: bool,
}

impl Inner {
    fn in_backoff(&self, key: &TagKey) -> bool {
        self.retries
            .get(key)
            .is_some_and(|state| state.scheduled.is_some())
    }
}

#[derive(Default)]
pub struct WorkQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a request.
    ///
    /// Returns `false` if the key was already pending (the newer request replaces the queued
    /// one without changing its position), is waiting for a scheduled retry, or the queue is
    /// shutting down.
    pub fn add(&self, req: ReconcileRequest) -> bool {
        let mut inner = self.lock();
        if inner.shutting_down || inner.in_backoff(&req.key) {
            return false;
        }
        if let Some(queued) = inner.pending.get_mut(&req.key) {
            *queued = req;
            return false;
        }

        let key = req.key.clone();
        let processing = inner.processing.contains(&key);
        inner.pending.insert(key.clone(), req);
        if !processing {
            inner.order.push_back(key);
            drop(inner);
            self.notify.notify_waiters();
        }
        true
    }

    /// Put `key` in backoff and enqueue a retry request for it after `delay`.
    ///
    /// A request that arrived while the key was in flight is absorbed by the retry, as is
    /// every add until the retry fires. [`WorkQueue::forget`] cancels the retry.
    pub fn retry_after(self: &Arc<Self>, key: TagKey, delay: Duration) {
        let token = {
            let mut inner = self.lock();
            if inner.shutting_down {
                return;
            }
            inner.next_token += 1;
            let token = inner.next_token;
            inner.retries.entry(key.clone()).or_default().scheduled = Some(token);
            if inner.pending.remove(&key).is_some() {
                inner.order.retain(|k| k != &key);
            }
            token
        };

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.fire_retry(key, token);
        });
    }

    fn fire_retry(&self, key: TagKey, token: u64) {
        {
            let mut inner = self.lock();
            match inner.retries.get_mut(&key) {
                Some(state) if state.scheduled == Some(token) => state.scheduled = None,
                _ => return,
            }
        }
        self.add(ReconcileRequest::retry(key));
    }

    /// Take the next request without waiting.
    pub fn try_get(&self) -> Option<ReconcileRequest> {
        let mut inner = self.lock();
        let key = inner.order.pop_front()?;
        let req = inner.pending.remove(&key)?;
        inner.processing.insert(key);
        Some(req)
    }

    /// Wait for the next request.
    ///
    /// Returns `None` once the queue is shut down and drained.
    pub async fn get(&self) -> Option<ReconcileRequest> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(req) = self.try_get() {
                return Some(req);
            }
            if self.is_shutting_down() {
                return None;
            }
            notified.await;
        }
    }

    /// Mark processing of `key` finished.
    ///
    /// If the key was re-added while in flight it goes back to the tail of the queue.
    pub fn done(&self, key: &TagKey) {
        let mut inner = self.lock();
        inner.processing.remove(key);
        if inner.pending.contains_key(key) {
            inner.order.push_back(key.clone());
            drop(inner);
            self.notify.notify_waiters();
        }
    }

    /// Count one more retry of `key` against `budget` and return that budget's new total.
    pub fn record_retry(&self, key: &TagKey, budget: RetryBudget) -> u32 {
        let mut inner = self.lock();
        let state = inner.retries.entry(key.clone()).or_default();
        let n = match budget {
            RetryBudget::Transient => &mut state.transient,
            RetryBudget::CatalogLag => &mut state.catalog_lag,
        };
        *n += 1;
        *n
    }

    /// Retries recorded for `key` against `budget`.
    pub fn retries(&self, key: &TagKey, budget: RetryBudget) -> u32 {
        self.lock().retries.get(key).map_or(0, |state| match budget {
            RetryBudget::Transient => state.transient,
            RetryBudget::CatalogLag => state.catalog_lag,
        })
    }

    /// Jobs launched for `key` by attempts that ended in a retry.
    pub fn launched(&self, key: &TagKey) -> Vec<JobSpec> {
        self.lock()
            .retries
            .get(key)
            .map(|state| state.launched.clone())
            .unwrap_or_default()
    }

    /// Remember the jobs launched so far so the retry of `key` skips them.
    pub fn record_launched(&self, key: &TagKey, launched: Vec<JobSpec>) {
        self.lock().retries.entry(key.clone()).or_default().launched = launched;
    }

    /// Reset retry accounting for `key` after it settled and cancel any scheduled retry.
    pub fn forget(&self, key: &TagKey) {
        self.lock().retries.remove(key);
    }

    /// Stop accepting new work and wake every waiting worker.
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Number of pending (not in-flight) requests.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests held by workers.
    pub fn processing_len(&self) -> usize {
        self.lock().processing.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsync_model::EnqueueReason;

    fn key(tag: &str) -> TagKey {
        TagKey::new("ci", "builder", tag)
    }

    #[test]
    fn duplicate_adds_collapse() {
        let queue = WorkQueue::new();
        assert!(queue.add(ReconcileRequest::event(key("v1"))));
        for _ in 0..4 {
            assert!(!queue.add(ReconcileRequest::event(key("v1"))));
        }

        assert_eq!(queue.len(), 1);
        assert!(queue.try_get().is_some());
        assert!(queue.try_get().is_none());
    }

    #[test]
    fn latest_request_wins_while_pending() {
        let queue = WorkQueue::new();
        queue.add(ReconcileRequest::event(key("v1")));
        queue.add(ReconcileRequest::resync(key("v1")));

        assert_eq!(queue.try_get().unwrap().reason, EnqueueReason::Resync);
    }

    #[test]
    fn key_in_flight_is_not_handed_out_twice() {
        let queue = WorkQueue::new();
        queue.add(ReconcileRequest::event(key("v1")));
        let req = queue.try_get().unwrap();

        assert!(queue.add(ReconcileRequest::event(key("v1"))));
        assert!(queue.try_get().is_none());
        assert_eq!(queue.processing_len(), 1);

        queue.done(&req.key);
        assert!(queue.try_get().is_some());
    }

    #[test]
    fn fifo_across_keys() {
        let queue = WorkQueue::new();
        queue.add(ReconcileRequest::event(key("a")));
        queue.add(ReconcileRequest::event(key("b")));
        queue.add(ReconcileRequest::event(key("a")));

        assert_eq!(queue.try_get().unwrap().key, key("a"));
        assert_eq!(queue.try_get().unwrap().key, key("b"));
    }

    #[test]
    fn retry_budgets_are_counted_apart_and_forgotten() {
        let queue = WorkQueue::new();
        assert_eq!(queue.record_retry(&key("a"), RetryBudget::CatalogLag), 1);
        assert_eq!(queue.record_retry(&key("a"), RetryBudget::CatalogLag), 2);
        assert_eq!(queue.record_retry(&key("a"), RetryBudget::Transient), 1);
        assert_eq!(queue.retries(&key("a"), RetryBudget::CatalogLag), 2);
        assert_eq!(queue.retries(&key("a"), RetryBudget::Transient), 1);

        queue.forget(&key("a"));
        assert!(queue.launched(&key("a")).is_empty());
        assert_eq!(queue.retries(&key("a"), RetryBudget::CatalogLag), 0);
        assert_eq!(queue.retries(&key("a"), RetryBudget::Transient), 0);
    }

    #[tokio::test]
    async fn shutdown_releases_waiters_and_rejects_adds() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.get().await }
        });
        tokio::task::yield_now().await;

        queue.shut_down();
        assert!(waiter.await.unwrap().is_none());
        assert!(!queue.add(ReconcileRequest::event(key("late"))));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_is_delivered_after_delay() {
        let queue = Arc::new(WorkQueue::new());
        queue.retry_after(key("a"), Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(queue.is_empty());

        let req = tokio::time::timeout(Duration::from_secs(5), queue.get())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(req.reason, EnqueueReason::Retry);
    }

    #[tokio::test(start_paused = true)]
    async fn adds_during_backoff_wait_for_the_retry() {
        let queue = Arc::new(WorkQueue::new());
        queue.retry_after(key("a"), Duration::from_secs(2));

        assert!(!queue.add(ReconcileRequest::resync(key("a"))));
        assert!(!queue.add(ReconcileRequest::event(key("a"))));
        assert!(queue.try_get().is_none());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(queue.try_get().unwrap().reason, EnqueueReason::Retry);
        assert!(queue.try_get().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn request_added_in_flight_is_absorbed_by_retry() {
        let queue = Arc::new(WorkQueue::new());
        queue.add(ReconcileRequest::event(key("a")));
        let req = queue.try_get().unwrap();
        queue.add(ReconcileRequest::event(key("a")));

        queue.retry_after(req.key.clone(), Duration::from_secs(1));
        queue.done(&req.key);
        assert!(queue.try_get().is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(queue.try_get().unwrap().reason, EnqueueReason::Retry);
    }

    #[tokio::test(start_paused = true)]
    async fn forgotten_key_drops_its_scheduled_retry() {
        let queue = Arc::new(WorkQueue::new());
        queue.retry_after(key("a"), Duration::from_secs(1));
        queue.forget(&key("a"));

        assert!(queue.add(ReconcileRequest::resync(key("a"))));
        let req = queue.try_get().unwrap();
        queue.done(&req.key);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(queue.try_get().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduled_retry_replaces_the_older_timer() {
        let queue = Arc::new(WorkQueue::new());
        queue.retry_after(key("a"), Duration::from_secs(1));
        queue.retry_after(key("a"), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(queue.try_get().is_none());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(queue.try_get().is_some());
    }
}
