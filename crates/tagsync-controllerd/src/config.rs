//! Daemon configuration file.
//!
//! JSON, camelCase keys, every field optional. Loaded once at startup; any problem is fatal.
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tagsync_core::{ControllerSettings, LeaderElectionConfig, ReconcilePolicy};
use tagsync_exec::subprocess::SubprocessConfig;
use tagsync_model::{Flag, RetryStrategy};
use tagsync_observe::LoggerConfig;
use thiserror::Error;

/// Environment variable consulted when no config path is given on the command line.
pub const CONFIG_ENV: &str = "TAGSYNC_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file given (pass a path or set {CONFIG_ENV})")]
    MissingPath,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DaemonConfig {
    pub logger: LoggerConfig,
    /// Log launch intents instead of creating jobs.
    pub dry_run: bool,
    /// Lease holder identity; defaults to `HOSTNAME` or a random id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Namespace jobs are created in.
    pub job_namespace: String,
    /// Organizations never reconciled.
    pub ignored_organizations: Vec<String>,
    /// Address of the `/metrics` and `/healthz` endpoint; disabled when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_addr: Option<SocketAddr>,
    pub leader_election: LeaderElectionSection,
    pub catalog: CatalogSection,
    pub tags: TagsSection,
    pub reconcile: ReconcileSection,
    pub launcher: SubprocessConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeaderElectionSection {
    pub namespace: String,
    pub lease_name: String,
    /// Directory shared by the fleet; without it the lease lives in process memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_dir: Option<PathBuf>,
    pub lease_duration_ms: u64,
    pub renew_deadline_ms: u64,
    pub retry_period_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogSection {
    pub path: PathBuf,
    pub reload_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagsSection {
    pub path: PathBuf,
    /// Only watch tags of this namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconcileSection {
    pub workers: usize,
    pub resync_interval_ms: u64,
    pub launch_timeout_ms: u64,
    pub retry: RetryStrategy,
    pub catalog_grace_ms: u64,
    pub catalog_miss_retries: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            logger: LoggerConfig::default(),
            dry_run: true,
            identity: None,
            job_namespace: "ci".to_string(),
            ignored_organizations: Vec::new(),
            metrics_addr: None,
            leader_election: LeaderElectionSection::default(),
            catalog: CatalogSection::default(),
            tags: TagsSection::default(),
            reconcile: ReconcileSection::default(),
            launcher: SubprocessConfig::default(),
        }
    }
}

impl Default for LeaderElectionSection {
    fn default() -> Self {
        Self {
            namespace: "ci".to_string(),
            lease_name: "tagsync-controller".to_string(),
            lease_dir: None,
            lease_duration_ms: 15_000,
            renew_deadline_ms: 10_000,
            retry_period_ms: 2_000,
        }
    }
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            reload_interval_ms: 120_000,
        }
    }
}

impl Default for TagsSection {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            namespace: None,
            poll_interval_ms: 10_000,
        }
    }
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            workers: 4,
            resync_interval_ms: 24 * 60 * 60 * 1_000,
            launch_timeout_ms: 30_000,
            retry: RetryStrategy::default(),
            catalog_grace_ms: 300_000,
            catalog_miss_retries: 3,
        }
    }
}

impl DaemonConfig {
    /// Config path from the first argument, then [`CONFIG_ENV`].
    pub fn path_from_env(mut args: impl Iterator<Item = String>) -> Result<PathBuf, ConfigError> {
        args.next()
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingPath)
    }

    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_json(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Check every rule and report all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        let le = &self.leader_election;

        if le.namespace.trim().is_empty() {
            problems.push("leaderElection.namespace must be set".to_string());
        }
        if le.lease_name.trim().is_empty() {
            problems.push("leaderElection.leaseName must be set".to_string());
        }
        if le.retry_period_ms == 0 {
            problems.push("leaderElection.retryPeriodMs must be positive".to_string());
        }
        if le.renew_deadline_ms >= le.lease_duration_ms {
            problems.push("leaderElection.renewDeadlineMs must be below leaseDurationMs".to_string());
        }
        if le.retry_period_ms >= le.renew_deadline_ms {
            problems.push("leaderElection.retryPeriodMs must be below renewDeadlineMs".to_string());
        }
        if self.catalog.path.as_os_str().is_empty() {
            problems.push("catalog.path must be set".to_string());
        }
        if self.catalog.reload_interval_ms == 0 {
            problems.push("catalog.reloadIntervalMs must be positive".to_string());
        }
        if self.tags.path.as_os_str().is_empty() {
            problems.push("tags.path must be set".to_string());
        }
        if self.tags.poll_interval_ms == 0 {
            problems.push("tags.pollIntervalMs must be positive".to_string());
        }
        if self.job_namespace.trim().is_empty() {
            problems.push("jobNamespace must be set".to_string());
        }
        if self.reconcile.workers == 0 {
            problems.push("reconcile.workers must be at least 1".to_string());
        }
        if self.reconcile.resync_interval_ms == 0 {
            problems.push("reconcile.resyncIntervalMs must be positive".to_string());
        }
        if self.reconcile.launch_timeout_ms == 0 {
            problems.push("reconcile.launchTimeoutMs must be positive".to_string());
        }
        if let Err(e) = self.reconcile.retry.validate() {
            problems.push(format!("reconcile.{e}"));
        }
        if !self.dry_run {
            if let Err(e) = self.launcher.validate() {
                problems.push(format!("launcher: {e} (required unless dryRun is set)"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Configured identity, else `HOSTNAME`, else a random one.
    pub fn resolved_identity(&self) -> String {
        self.identity
            .clone()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.trim().is_empty()))
            .unwrap_or_else(|| format!("tagsync-{}", uuid::Uuid::new_v4()))
    }

    pub fn election_config(&self) -> LeaderElectionConfig {
        let le = &self.leader_election;
        LeaderElectionConfig {
            identity: self.resolved_identity(),
            lease_duration: Duration::from_millis(le.lease_duration_ms),
            renew_deadline: Duration::from_millis(le.renew_deadline_ms),
            retry_period: Duration::from_millis(le.retry_period_ms),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        let rc = &self.reconcile;
        ControllerSettings {
            workers: rc.workers,
            resync_interval: Duration::from_millis(rc.resync_interval_ms),
            catalog_reload_interval: Duration::from_millis(self.catalog.reload_interval_ms),
            retry: rc.retry.clone(),
            catalog_miss_retries: rc.catalog_miss_retries,
            policy: ReconcilePolicy {
                dry_run: Flag::from(self.dry_run),
                job_namespace: self.job_namespace.clone(),
                launch_timeout: Duration::from_millis(rc.launch_timeout_ms),
                catalog_grace: Duration::from_millis(rc.catalog_grace_ms),
            },
        }
    }
}
