//! Seam to the job-execution backend.
mod error;
pub use error::LaunchError;

use async_trait::async_trait;
use tagsync_model::JobSpec;

/// Creates jobs on the execution backend.
///
/// Implementations must tolerate the same [`JobSpec`] being submitted more than once:
/// retries and leadership handoffs can both produce duplicates.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    /// Launcher name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Request creation of the job.
    async fn launch(&self, spec: &JobSpec) -> Result<(), LaunchError>;
}

/// Launcher used when no backend is configured (dry-run deployments).
///
/// Every call fails permanently, so a misconfigured live deployment is loud instead of silent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLauncher;

#[async_trait]
impl JobLauncher for DisabledLauncher {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn launch(&self, spec: &JobSpec) -> Result<(), LaunchError> {
        Err(LaunchError::Permanent(format!(
            "no launcher configured for job {}",
            spec.job
        )))
    }
}
