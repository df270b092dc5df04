use serde::{Deserialize, Serialize};

use super::JitterStrategy;

/// Restart backoff for supervised background tasks (catalog reload, resync, leader tick, ...).
///
/// `delay_ms` is the pause after a successful run; for periodic tasks it is the period.
/// `first_ms`/`max_ms`/`factor` shape the delay after failed runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffStrategy {
    #[serde(default)]
    pub jitter: JitterStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl BackoffStrategy {
    /// Backoff for a task that runs once every `period_ms` and retries failures after
    /// `first_ms`, doubling up to `period_ms`.
    pub fn periodic(period_ms: u64, first_ms: u64) -> Self {
        Self {
            jitter: JitterStrategy::Equal,
            delay_ms: Some(period_ms),
            first_ms: first_ms.min(period_ms),
            max_ms: period_ms,
            factor: 2.0,
        }
    }

    /// Backoff for a long-running loop that is only restarted after a failure.
    pub fn on_failure(first_ms: u64, max_ms: u64) -> Self {
        Self {
            jitter: JitterStrategy::Full,
            delay_ms: None,
            first_ms,
            max_ms,
            factor: 2.0,
        }
    }
}
