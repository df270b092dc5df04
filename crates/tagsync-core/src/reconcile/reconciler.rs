use std::{sync::Arc, time::Duration};

use tagsync_model::{Flag, JobSpec, ReconcileRequest};
use tracing::{debug, info, instrument, warn};

use super::{Outcome, RetryBudget, SkipReason};
use crate::{
    catalog::ConfigCache,
    clock::unix_ms,
    exclusion::ExclusionFilter,
    launcher::{JobLauncher, LaunchError},
    leader::LeaderGate,
    metrics::{LaunchOutcome, MetricsHandle, noop_metrics},
    tags::TagStore,
};

/// Decision-path settings.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// When enabled, launches are logged instead of sent to the backend.
    pub dry_run: Flag,
    /// Namespace jobs are created in.
    pub job_namespace: String,
    /// Upper bound for one launch call.
    pub launch_timeout: Duration,
    /// A tag younger than this with no catalog entry is retried instead of skipped.
    pub catalog_grace: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            dry_run: Flag::enabled(),
            job_namespace: "ci".to_string(),
            launch_timeout: Duration::from_secs(30),
            catalog_grace: Duration::from_secs(300),
        }
    }
}

/// Settles a single reconcile request against live state.
///
/// Holds no per-request state; any number of workers share one instance.
pub struct Reconciler {
    tags: Arc<dyn TagStore>,
    cache: Arc<ConfigCache>,
    exclusion: Arc<ExclusionFilter>,
    launcher: Arc<dyn JobLauncher>,
    gate: Arc<LeaderGate>,
    policy: ReconcilePolicy,
    metrics: MetricsHandle,
}

impl Reconciler {
    pub fn new(
        tags: Arc<dyn TagStore>,
        cache: Arc<ConfigCache>,
        exclusion: Arc<ExclusionFilter>,
        launcher: Arc<dyn JobLauncher>,
        gate: Arc<LeaderGate>,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            tags,
            cache,
            exclusion,
            launcher,
            gate,
            policy,
            metrics: noop_metrics(),
        }
    }

    /// Replace the metrics backend and return updated reconciler.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Re-read the tag and launch whatever its catalog entry asks for.
    ///
    /// The request only identifies the tag; organization, repository and branch are always taken
    /// from the current tag state.
    pub async fn reconcile(&self, req: &ReconcileRequest) -> Outcome {
        self.reconcile_with(req, &mut Vec::new()).await
    }

    /// Like [`Reconciler::reconcile`], but jobs equal to one in `launched` are not launched
    /// again. Every successful launch is appended to `launched`.
    #[instrument(level = "debug", skip(self, req, launched), fields(tag = %req.key, reason = %req.reason))]
    pub async fn reconcile_with(&self, req: &ReconcileRequest, launched: &mut Vec<JobSpec>) -> Outcome {
        let info = match self.tags.get(&req.key).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!("tag no longer exists");
                return Outcome::Skipped(SkipReason::TagGone);
            }
            Err(e) => {
                return Outcome::Retry {
                    budget: RetryBudget::Transient,
                    reason: e.to_string(),
                };
            }
        };
        let Some(source) = info.source.clone() else {
            debug!("tag has no source reference");
            return Outcome::Skipped(SkipReason::NoSource);
        };

        if self.exclusion.is_excluded(&source.org) {
            debug!(org = %source.org, "organization excluded");
            return Outcome::Skipped(SkipReason::Excluded);
        }

        let Some(entry) = self.cache.lookup(&source.org, &source.repo, &source.branch) else {
            let grace = u64::try_from(self.policy.catalog_grace.as_millis()).unwrap_or(u64::MAX);
            if info.is_new(unix_ms(), grace) {
                return Outcome::Retry {
                    budget: RetryBudget::CatalogLag,
                    reason: format!("no catalog entry for {source} yet"),
                };
            }
            debug!(%source, "no catalog entry");
            return Outcome::Skipped(SkipReason::NoCatalogEntry);
        };
        if entry.jobs.is_empty() {
            debug!(%source, "catalog entry lists no jobs");
            return Outcome::Skipped(SkipReason::NoJobs);
        }

        let specs: Vec<JobSpec> = entry
            .jobs
            .iter()
            .map(|(name, def)| {
                JobSpec::new(
                    name.as_str(),
                    self.policy.job_namespace.as_str(),
                    req.key.clone(),
                    source.clone(),
                    def.clone(),
                )
            })
            .collect();

        if self.policy.dry_run.is_enabled() {
            for spec in &specs {
                info!(
                    job = %spec.job,
                    namespace = %spec.namespace,
                    org = %spec.source.org,
                    repo = %spec.source.repo,
                    branch = %spec.source.branch,
                    "dry-run: would launch job"
                );
                self.metrics.record_launch(LaunchOutcome::DryRun);
            }
            return Outcome::Succeeded {
                launched: 0,
                dry_run: true,
            };
        }

        let outstanding: Vec<JobSpec> = specs
            .into_iter()
            .filter(|spec| !launched.contains(spec))
            .collect();
        if outstanding.len() < entry.jobs.len() {
            debug!(
                skipped = entry.jobs.len() - outstanding.len(),
                "jobs launched by an earlier attempt are not launched again"
            );
        }
        self.launch_all(&outstanding, launched).await
    }

    async fn launch_all(&self, specs: &[JobSpec], done: &mut Vec<JobSpec>) -> Outcome {
        let mut launched = 0;
        let mut transient: Option<LaunchError> = None;
        let mut permanent: Option<LaunchError> = None;

        for spec in specs {
            if !self.gate.is_leader() {
                warn!(job = %spec.job, "leadership lost before launch; leaving it to the new leader");
                return Outcome::Skipped(SkipReason::NotLeader);
            }

            match self.launch_one(spec).await {
                Ok(()) => {
                    launched += 1;
                    done.push(spec.clone());
                    self.metrics.record_launch(LaunchOutcome::Launched);
                    info!(job = %spec.job, key = %spec.idempotency_key(), "job launched");
                }
                Err(e) => {
                    self.metrics.record_launch(e.outcome());
                    if e.is_transient() {
                        transient.get_or_insert(e);
                    } else {
                        permanent.get_or_insert(e);
                    }
                }
            }
        }

        match (transient, permanent) {
            (Some(e), _) => Outcome::Retry {
                budget: RetryBudget::Transient,
                reason: e.to_string(),
            },
            (None, Some(e)) => Outcome::Failed(e.to_string()),
            (None, None) => Outcome::Succeeded {
                launched,
                dry_run: false,
            },
        }
    }

    async fn launch_one(&self, spec: &JobSpec) -> Result<(), LaunchError> {
        let timeout = self.policy.launch_timeout;
        match tokio::time::timeout(timeout, self.launcher.launch(spec)).await {
            Ok(res) => res,
            Err(_elapsed) => Err(LaunchError::Timeout(timeout)),
        }
    }
}
