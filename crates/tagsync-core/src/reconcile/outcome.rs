use std::fmt;

/// Lifecycle state of a reconcile request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileState {
    Pending,
    Processing,
    Succeeded,
    Skipped,
    Retrying,
    PermanentlyFailed,
}

impl ReconcileState {
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            ReconcileState::Pending => "pending",
            ReconcileState::Processing => "processing",
            ReconcileState::Succeeded => "succeeded",
            ReconcileState::Skipped => "skipped",
            ReconcileState::Retrying => "retrying",
            ReconcileState::PermanentlyFailed => "permanently_failed",
        }
    }

    /// `true` for states a request does not leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileState::Succeeded | ReconcileState::Skipped | ReconcileState::PermanentlyFailed
        )
    }
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Why a request settled without launching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Tag no longer exists.
    TagGone,
    /// Tag carries no organization/repository/branch.
    NoSource,
    /// Organization is in the exclusion list.
    Excluded,
    /// No job catalog entry for the source.
    NoCatalogEntry,
    /// Catalog entry exists but lists no jobs.
    NoJobs,
    /// Leadership was lost before the launch.
    NotLeader,
}

impl SkipReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            SkipReason::TagGone => "tag_gone",
            SkipReason::NoSource => "no_source",
            SkipReason::Excluded => "excluded",
            SkipReason::NoCatalogEntry => "no_catalog_entry",
            SkipReason::NoJobs => "no_jobs",
            SkipReason::NotLeader => "not_leader",
        }
    }
}

/// Which retry allowance a retryable outcome draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// Launch or tag-read failure; bounded by the retry strategy.
    Transient,
    /// New tag whose catalog entry has not been loaded yet.
    CatalogLag,
}

/// Result of reconciling one request, before the retry discipline is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded { launched: usize, dry_run: bool },
    Skipped(SkipReason),
    Retry { budget: RetryBudget, reason: String },
    Failed(String),
}

impl Outcome {
    /// State this outcome maps to when no retry budget is involved.
    pub fn state(&self) -> ReconcileState {
        match self {
            Outcome::Succeeded { .. } => ReconcileState::Succeeded,
            Outcome::Skipped(_) => ReconcileState::Skipped,
            Outcome::Retry { .. } => ReconcileState::Retrying,
            Outcome::Failed(_) => ReconcileState::PermanentlyFailed,
        }
    }
}
