//! Wiring of the reconciliation engine under a taskvisor supervisor.
//! - Owns the work queue, the reconciler and the resyncer.
//! - Builds the task specs of every background loop.
//! - Runs the supervisor and performs the shutdown sequence.
use std::{sync::Arc, time::Duration};

use taskvisor::{Config as SupervisorConfig, Subscribe, Supervisor, TaskSpec};
use tagsync_model::RetryStrategy;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::{
    catalog::ConfigCache,
    error::CoreError,
    exclusion::ExclusionFilter,
    launcher::JobLauncher,
    leader::{LeaderElector, LeaderTransition},
    metrics::MetricsHandle,
    queue::WorkQueue,
    reconcile::{ReconcilePolicy, Reconciler, Resyncer, Worker},
    tags::{ChangeSource, TagStore},
    tasks::{catalog_reload_task, leader_task, leader_tick, resync_task, watch_task, worker_task},
};

/// Collaborators injected into the controller.
pub struct ControllerDeps {
    pub tags: Arc<dyn TagStore>,
    pub cache: Arc<ConfigCache>,
    pub exclusion: Arc<ExclusionFilter>,
    pub launcher: Arc<dyn JobLauncher>,
    pub elector: Arc<LeaderElector>,
    pub metrics: MetricsHandle,
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Size of the worker pool.
    pub workers: usize,
    /// Period of the full resync sweep.
    pub resync_interval: Duration,
    /// Period of the catalog reload.
    pub catalog_reload_interval: Duration,
    /// Retry discipline for transient failures.
    pub retry: RetryStrategy,
    /// Retries granted to a new tag whose catalog entry is not loaded yet.
    pub catalog_miss_retries: u32,
    pub policy: ReconcilePolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            resync_interval: Duration::from_secs(24 * 60 * 60),
            catalog_reload_interval: Duration::from_secs(120),
            retry: RetryStrategy::default(),
            catalog_miss_retries: 3,
            policy: ReconcilePolicy::default(),
        }
    }
}

/// Single-active reconciliation controller.
pub struct ControllerManager {
    deps: ControllerDeps,
    settings: ControllerSettings,
    queue: Arc<WorkQueue>,
    reconciler: Arc<Reconciler>,
    resync: Arc<Resyncer>,
}

impl ControllerManager {
    pub fn new(deps: ControllerDeps, settings: ControllerSettings) -> Self {
        let queue = Arc::new(WorkQueue::new());
        let reconciler = Reconciler::new(
            Arc::clone(&deps.tags),
            Arc::clone(&deps.cache),
            Arc::clone(&deps.exclusion),
            Arc::clone(&deps.launcher),
            deps.elector.gate(),
            settings.policy.clone(),
        )
        .with_metrics(Arc::clone(&deps.metrics));
        let resync = Resyncer::new(Arc::clone(&deps.tags), Arc::clone(&queue))
            .with_metrics(Arc::clone(&deps.metrics));

        Self {
            deps,
            settings,
            queue,
            reconciler: Arc::new(reconciler),
            resync: Arc::new(resync),
        }
    }

    pub fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.queue)
    }

    pub fn resyncer(&self) -> Arc<Resyncer> {
        Arc::clone(&self.resync)
    }

    pub fn elector(&self) -> Arc<LeaderElector> {
        Arc::clone(&self.deps.elector)
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Build worker number `id` of the pool.
    pub fn worker(&self, id: usize) -> Worker {
        Worker::new(
            id,
            Arc::clone(&self.queue),
            Arc::clone(&self.reconciler),
            self.deps.elector.gate(),
            self.settings.retry.clone(),
            self.settings.catalog_miss_retries,
        )
        .with_metrics(Arc::clone(&self.deps.metrics))
    }

    /// One election round; a fresh leader resyncs everything.
    pub async fn leader_tick(&self) -> LeaderTransition {
        leader_tick(&self.deps.elector, &self.resync).await
    }

    /// Task specs of the engine: catalog reload, resync, leader election, watch pump and workers.
    pub fn task_specs(&self, changes: Option<Box<dyn ChangeSource>>) -> Vec<TaskSpec> {
        let mut specs = vec![
            catalog_reload_task(
                Arc::clone(&self.deps.cache),
                self.settings.catalog_reload_interval,
            ),
            resync_task(Arc::clone(&self.resync), self.settings.resync_interval),
            leader_task(Arc::clone(&self.deps.elector), Arc::clone(&self.resync)),
        ];
        if let Some(source) = changes {
            specs.push(watch_task(Arc::clone(&self.resync), Arc::new(Mutex::new(source))));
        }
        for id in 0..self.settings.workers.max(1) {
            specs.push(worker_task(Arc::new(self.worker(id))));
        }
        specs
    }

    /// Run `specs` under a supervisor until it stops, then shut down.
    ///
    /// The supervisor handles termination signals; in-flight reconciles finish within its grace
    /// period. Afterwards the queue stops accepting work and the lease is released.
    #[instrument(level = "debug", skip_all, fields(tasks = specs.len()))]
    pub async fn run(
        &self,
        sup_cfg: SupervisorConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
        specs: Vec<TaskSpec>,
    ) -> Result<(), CoreError> {
        let sup = Supervisor::builder(sup_cfg)
            .with_subscribers(subscribers)
            .build();

        info!(identity = %self.deps.elector.identity(), "controller starting");
        let res = sup
            .run(specs)
            .await
            .map_err(|e| CoreError::Supervisor(e.to_string()));

        self.shutdown().await;
        res
    }

    /// Stop accepting work and hand leadership over.
    pub async fn shutdown(&self) {
        self.queue.shut_down();
        if let Err(e) = self.deps.elector.release().await {
            warn!(error = %e, "failed to release leader lease; standby waits for expiry");
        }
        info!("controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leader::{LeaderElectionConfig, MemoryLeaseBackend};
    use crate::metrics::noop_metrics;
    use crate::testing::{Fixture, catalog_entry, tag_info, tag_key};
    use tagsync_model::{Flag, ReconcileRequest};
    use tokio_util::sync::CancellationToken;

    async fn manager(backend: &Arc<MemoryLeaseBackend>, identity: &str) -> (ControllerManager, Fixture) {
        let fx = Fixture::live()
            .with_catalog(vec![catalog_entry("acme", "widgets", "main", &["unit-tests"])])
            .await;
        fx.tags.upsert(tag_info("v2", "acme", "widgets", "main"));

        let elector = LeaderElector::new(
            backend.clone(),
            LeaderElectionConfig {
                identity: identity.to_string(),
                ..Default::default()
            },
        );
        let deps = ControllerDeps {
            tags: fx.tags.clone(),
            cache: fx.cache.clone(),
            exclusion: fx.exclusion.clone(),
            launcher: fx.launcher.clone(),
            elector: Arc::new(elector),
            metrics: noop_metrics(),
        };
        let settings = ControllerSettings {
            workers: 2,
            policy: ReconcilePolicy {
                dry_run: Flag::disabled(),
                ..Default::default()
            },
            ..Default::default()
        };
        (ControllerManager::new(deps, settings), fx)
    }

    #[tokio::test(start_paused = true)]
    async fn no_launch_until_leadership_then_full_resync() {
        let backend = Arc::new(MemoryLeaseBackend::new());
        let (ctrl, fx) = manager(&backend, "a").await;
        let cancel = CancellationToken::new();
        let workers: Vec<_> = (0..2)
            .map(|id| {
                let worker = ctrl.worker(id);
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect();

        ctrl.queue().add(ReconcileRequest::event(tag_key("v2")));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fx.launcher.count(), 0);

        fx.tags.upsert(tag_info("v3", "acme", "widgets", "main"));
        assert_eq!(ctrl.leader_tick().await, LeaderTransition::Acquired);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut tags: Vec<_> = fx.launcher.calls().into_iter().map(|s| s.tag).collect();
        tags.sort();
        assert_eq!(tags, vec![tag_key("v2"), tag_key("v3")]);

        cancel.cancel();
        for w in workers {
            w.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_lease_for_standby() {
        let backend = Arc::new(MemoryLeaseBackend::new());
        let (leader, _fx) = manager(&backend, "a").await;
        let (standby, _fx2) = manager(&backend, "b").await;

        assert_eq!(leader.leader_tick().await, LeaderTransition::Acquired);
        assert_eq!(standby.leader_tick().await, LeaderTransition::Standby);

        leader.shutdown().await;

        assert!(leader.queue().is_shutting_down());
        assert!(!leader.elector().is_held());
        assert_eq!(standby.leader_tick().await, LeaderTransition::Acquired);
    }

    #[tokio::test]
    async fn task_specs_cover_every_loop() {
        let backend = Arc::new(MemoryLeaseBackend::new());
        let (ctrl, _fx) = manager(&backend, "a").await;
        let (_notifier, changes) = crate::tags::change_channel(1);

        assert_eq!(ctrl.task_specs(None).len(), 3 + 2);
        assert_eq!(ctrl.task_specs(Some(Box::new(changes))).len(), 4 + 2);
    }
}
