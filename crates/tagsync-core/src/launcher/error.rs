use std::time::Duration;

use thiserror::Error;

use crate::metrics::LaunchOutcome;

#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    /// Backend unavailable, rate-limited or otherwise worth retrying.
    #[error("transient launch failure: {0}")]
    Transient(String),

    /// Invalid job or definitive rejection.
    #[error("permanent launch failure: {0}")]
    Permanent(String),

    #[error("launch timed out after {0:?}")]
    Timeout(Duration),
}

impl LaunchError {
    /// Timeouts count as transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, LaunchError::Permanent(_))
    }

    pub fn outcome(&self) -> LaunchOutcome {
        match self {
            LaunchError::Transient(_) => LaunchOutcome::Transient,
            LaunchError::Permanent(_) => LaunchOutcome::Permanent,
            LaunchError::Timeout(_) => LaunchOutcome::Timeout,
        }
    }
}
