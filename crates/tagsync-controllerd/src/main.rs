mod config;
mod http;

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use taskvisor::{Config as SupervisorConfig, Subscribe};
use tagsync_core::{
    ConfigCache, ControllerDeps, ControllerManager, DisabledLauncher, ExclusionFilter,
    FileCatalogSource, FileLeaseBackend, FileTagSource, JobLauncher, LeaderElector, LeaseBackend,
    MemoryLeaseBackend, MemoryTagStore, MetricsHandle, change_channel, tasks::tag_poll_task,
};
use tagsync_exec::subprocess::SubprocessLauncher;
use tagsync_observe::{Subscriber, init_logger};
use tagsync_prometheus::PrometheusMetrics;

use crate::config::DaemonConfig;

/// Buffered tag changes between the file poller and the watch pump.
const CHANGE_CAPACITY: usize = 1024;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) config
    let path = DaemonConfig::path_from_env(std::env::args().skip(1))?;
    let cfg = DaemonConfig::load(&path)?;

    // 2) logger
    init_logger(&cfg.logger)?;
    info!(config = %path.display(), dry_run = cfg.dry_run, "tagsync controller starting");

    // 3) metrics
    let prom = PrometheusMetrics::new()?;
    let metrics: MetricsHandle = Arc::new(prom.clone());

    // 4) catalog: the first load must succeed
    let source = Arc::new(FileCatalogSource::new(&cfg.catalog.path));
    let cache = Arc::new(ConfigCache::load(source, Arc::clone(&metrics)).await?);
    info!(entries = cache.snapshot().len(), "job catalog loaded");

    // 5) tags
    let store = Arc::new(MemoryTagStore::new());
    let (notifier, changes) = change_channel(CHANGE_CAPACITY);
    let mut tag_source = FileTagSource::new(&cfg.tags.path, Arc::clone(&store), notifier);
    if let Some(ns) = &cfg.tags.namespace {
        tag_source = tag_source.with_namespace(ns.clone());
    }

    // 6) launcher
    let launcher: Arc<dyn JobLauncher> = if cfg.launcher.command.trim().is_empty() {
        Arc::new(DisabledLauncher)
    } else {
        Arc::new(SubprocessLauncher::new(cfg.launcher.clone())?)
    };

    // 7) leader election
    let le = &cfg.leader_election;
    let backend: Arc<dyn LeaseBackend> = match &le.lease_dir {
        Some(dir) => Arc::new(FileLeaseBackend::in_dir(dir, &le.namespace, &le.lease_name)),
        None => {
            warn!("no leaseDir configured; leadership is local to this process");
            Arc::new(MemoryLeaseBackend::new())
        }
    };
    let elector = Arc::new(
        LeaderElector::new(backend, cfg.election_config()).with_metrics(Arc::clone(&metrics)),
    );
    info!(identity = elector.identity(), "leader election configured");

    // 8) controller + tasks
    let ctrl = ControllerManager::new(
        ControllerDeps {
            tags: store,
            cache,
            exclusion: Arc::new(ExclusionFilter::new(&cfg.ignored_organizations)),
            launcher,
            elector: Arc::clone(&elector),
            metrics,
        },
        cfg.controller_settings(),
    );

    let mut specs = ctrl.task_specs(Some(Box::new(changes)));
    specs.push(tag_poll_task(
        Arc::new(tag_source),
        Duration::from_millis(cfg.tags.poll_interval_ms),
    ));
    if let Some(addr) = cfg.metrics_addr {
        specs.push(http::http_task(addr, prom, elector));
    }

    // 9) run until the supervisor stops; the lease is released on the way out
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Subscriber)];
    ctrl.run(SupervisorConfig::default(), subscribers, specs).await?;

    info!("tagsync controller stopped");
    Ok(())
}
