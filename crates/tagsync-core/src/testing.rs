//! Fakes and fixtures shared by the unit tests.
use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tagsync_model::{
    Flag, JobCatalogEntry, JobDefinition, JobSpec, RetryStrategy, SourceRef, TagInfo, TagKey,
};
use tokio::time::Instant;

use crate::{
    catalog::{Catalog, CatalogError, CatalogSource, ConfigCache},
    exclusion::ExclusionFilter,
    launcher::{JobLauncher, LaunchError},
    leader::LeaderGate,
    metrics::noop_metrics,
    queue::WorkQueue,
    reconcile::{ReconcilePolicy, Reconciler, Worker},
    tags::MemoryTagStore,
};

/// Unique path under the system temp dir.
pub(crate) fn scratch_path(name: &str) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("tagsync-test-{}-{seq}-{name}", std::process::id()))
}

pub(crate) fn tag_key(tag: &str) -> TagKey {
    TagKey::new("ci", "builder", tag)
}

pub(crate) fn tag_info(tag: &str, org: &str, repo: &str, branch: &str) -> TagInfo {
    TagInfo::new(tag_key(tag), Some(SourceRef::new(org, repo, branch)))
}

pub(crate) fn catalog_entry(org: &str, repo: &str, branch: &str, jobs: &[&str]) -> JobCatalogEntry {
    jobs.iter().fold(JobCatalogEntry::new(org, repo, branch), |entry, job| {
        entry.with_job(*job, JobDefinition::default())
    })
}

/// Catalog source whose content and failures are set by the test.
pub(crate) struct ScriptedCatalogSource {
    entries: Mutex<Vec<JobCatalogEntry>>,
    failure: Mutex<Option<String>>,
}

impl ScriptedCatalogSource {
    pub(crate) fn new(entries: Vec<JobCatalogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            failure: Mutex::new(None),
        }
    }

    /// Serve `entries` from now on and clear any scripted failure.
    pub(crate) fn set_entries(&self, entries: Vec<JobCatalogEntry>) {
        *self.entries.lock().unwrap() = entries;
        *self.failure.lock().unwrap() = None;
    }

    /// Fail every load with a parse error until [`Self::set_entries`] is called.
    pub(crate) fn fail_with(&self, reason: &str) {
        *self.failure.lock().unwrap() = Some(reason.to_string());
    }
}

#[async_trait]
impl CatalogSource for ScriptedCatalogSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn load(&self) -> Result<Catalog, CatalogError> {
        if let Some(reason) = self.failure.lock().unwrap().clone() {
            return Err(CatalogError::Parse(reason));
        }
        Catalog::from_entries(self.entries.lock().unwrap().clone())
    }
}

/// Launcher that records every call and replays scripted results (success when empty).
#[derive(Default)]
pub(crate) struct RecordingLauncher {
    calls: Mutex<Vec<(JobSpec, Instant)>>,
    results: Mutex<VecDeque<Result<(), LaunchError>>>,
    delay: Option<Duration>,
}

impl RecordingLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every call take `delay` before returning.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn push_result(&self, res: Result<(), LaunchError>) {
        self.results.lock().unwrap().push_back(res);
    }

    pub(crate) fn calls(&self) -> Vec<JobSpec> {
        self.calls.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub(crate) fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl JobLauncher for RecordingLauncher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn launch(&self, spec: &JobSpec) -> Result<(), LaunchError> {
        self.calls.lock().unwrap().push((spec.clone(), Instant::now()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Builder for [`Fixture`].
pub(crate) struct FixtureBuilder {
    dry_run: bool,
    excluded: Vec<String>,
    launcher: RecordingLauncher,
}

impl FixtureBuilder {
    pub(crate) fn with_excluded(mut self, orgs: &[&str]) -> Self {
        self.excluded = orgs.iter().map(|o| o.to_string()).collect();
        self
    }

    pub(crate) fn with_launcher(mut self, launcher: RecordingLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    /// Load `entries` into the cache and finish the fixture. The gate starts open.
    pub(crate) async fn with_catalog(self, entries: Vec<JobCatalogEntry>) -> Fixture {
        let source = Arc::new(ScriptedCatalogSource::new(entries));
        let cache = ConfigCache::load(source.clone(), noop_metrics())
            .await
            .expect("scripted catalog loads");
        let gate = Arc::new(LeaderGate::new());
        gate.set(true);

        Fixture {
            tags: Arc::new(MemoryTagStore::new()),
            source,
            cache: Arc::new(cache),
            exclusion: Arc::new(ExclusionFilter::new(self.excluded)),
            launcher: Arc::new(self.launcher),
            gate,
            policy: ReconcilePolicy {
                dry_run: Flag::from(self.dry_run),
                ..Default::default()
            },
        }
    }
}

/// Engine collaborators backed by in-memory fakes.
pub(crate) struct Fixture {
    pub tags: Arc<MemoryTagStore>,
    pub source: Arc<ScriptedCatalogSource>,
    pub cache: Arc<ConfigCache>,
    pub exclusion: Arc<ExclusionFilter>,
    pub launcher: Arc<RecordingLauncher>,
    pub gate: Arc<LeaderGate>,
    pub policy: ReconcilePolicy,
}

impl Fixture {
    pub(crate) fn live() -> FixtureBuilder {
        FixtureBuilder {
            dry_run: false,
            excluded: Vec::new(),
            launcher: RecordingLauncher::new(),
        }
    }

    pub(crate) fn dry_run() -> FixtureBuilder {
        FixtureBuilder {
            dry_run: true,
            ..Self::live()
        }
    }

    pub(crate) fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.tags.clone(),
            self.cache.clone(),
            self.exclusion.clone(),
            self.launcher.clone(),
            self.gate.clone(),
            self.policy.clone(),
        )
    }

    pub(crate) fn worker(&self, queue: &Arc<WorkQueue>, retry: RetryStrategy, catalog_miss_retries: u32) -> Worker {
        self.worker_with_id(0, queue, retry, catalog_miss_retries)
    }

    pub(crate) fn worker_with_id(
        &self,
        id: usize,
        queue: &Arc<WorkQueue>,
        retry: RetryStrategy,
        catalog_miss_retries: u32,
    ) -> Worker {
        Worker::new(
            id,
            Arc::clone(queue),
            Arc::new(self.reconciler()),
            self.gate.clone(),
            retry,
            catalog_miss_retries,
        )
    }
}
