use std::sync::Arc;

use crate::reconcile::ReconcileState;

/// Result of a single launch call, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Backend accepted the job.
    Launched,
    /// Dry-run: launch was logged, backend not contacted.
    DryRun,
    /// Backend failed in a retryable way.
    Transient,
    /// Backend rejected the job definitively.
    Permanent,
    /// Launch call exceeded its timeout.
    Timeout,
}

impl LaunchOutcome {
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchOutcome::Launched => "launched",
            LaunchOutcome::DryRun => "dry_run",
            LaunchOutcome::Transient => "transient",
            LaunchOutcome::Permanent => "permanent",
            LaunchOutcome::Timeout => "timeout",
        }
    }
}

/// Backend metrics collection interface.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record one processed reconcile request and the state it settled in.
    ///
    /// # Arguments
    /// - `state`: state after processing (`Succeeded`, `Skipped`, `Retrying`, `PermanentlyFailed`)
    /// - `duration_ms`: processing time in milliseconds
    fn record_reconcile(&self, state: ReconcileState, duration_ms: u64);
    /// Record a launch call (or dry-run intent).
    fn record_launch(&self, outcome: LaunchOutcome);
    /// Record a catalog reload attempt.
    ///
    /// Failed reloads are the error counter operators alert on.
    fn record_catalog_reload(&self, success: bool);
    /// Publish whether this instance currently holds leadership.
    fn set_leader(&self, held: bool);
    /// Publish the number of queued (not in-flight) reconcile requests.
    fn set_queue_depth(&self, depth: usize);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
