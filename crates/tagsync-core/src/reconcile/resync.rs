use std::sync::Arc;

use tagsync_model::ReconcileRequest;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    metrics::{MetricsHandle, noop_metrics},
    queue::WorkQueue,
    tags::{ChangeSource, TagStore, TagStoreError},
};

/// Feeds the work queue.
///
/// [`Resyncer::sweep`] re-enqueues every known tag; [`Resyncer::pump`] forwards change
/// notifications. Both keep running on standby instances so a new leader starts with a warm queue.
pub struct Resyncer {
    tags: Arc<dyn TagStore>,
    queue: Arc<WorkQueue>,
    metrics: MetricsHandle,
}

impl Resyncer {
    pub fn new(tags: Arc<dyn TagStore>, queue: Arc<WorkQueue>) -> Self {
        Self {
            tags,
            queue,
            metrics: noop_metrics(),
        }
    }

    /// Replace the metrics backend and return updated resyncer.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Enqueue every tag currently known to the store. Returns the number of newly queued keys.
    #[instrument(level = "debug", skip(self))]
    pub async fn sweep(&self) -> Result<usize, TagStoreError> {
        let keys = self.tags.list().await?;
        let total = keys.len();

        let queued = keys
            .into_iter()
            .filter(|key| self.queue.add(ReconcileRequest::resync(key.clone())))
            .count();

        self.metrics.set_queue_depth(self.queue.len());
        info!(total, queued, "resync sweep enqueued tags");
        Ok(queued)
    }

    /// Forward change notifications into the queue until cancelled or the source closes.
    ///
    /// Deletions are enqueued like any other change; the reconciler finds the tag gone.
    pub async fn pump(&self, source: &mut dyn ChangeSource, cancel: CancellationToken) {
        loop {
            let change = tokio::select! {
                _ = cancel.cancelled() => return,
                change = source.next_change() => change,
            };
            let Some(change) = change else {
                debug!("change source closed");
                return;
            };

            let queued = self.queue.add(ReconcileRequest::event(change.key.clone()));
            debug!(tag = %change.key, kind = change.kind.as_label(), queued, "tag change received");
            self.metrics.set_queue_depth(self.queue.len());
        }
    }
}
