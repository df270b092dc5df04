use std::{fmt, str::FromStr, time::Instant};

use serde::{Deserialize, Serialize};

use super::TagKey;
use crate::error::{ModelError, ModelResult};

/// Why a tag was put on the reconcile queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnqueueReason {
    /// A change notification arrived from the watch.
    Event,
    /// Periodic or leadership-triggered full sweep.
    Resync,
    /// Requeue scheduled by the retry discipline.
    Retry,
}

impl EnqueueReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            EnqueueReason::Event => "event",
            EnqueueReason::Resync => "resync",
            EnqueueReason::Retry => "retry",
        }
    }
}

impl fmt::Display for EnqueueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for EnqueueReason {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event" => Ok(EnqueueReason::Event),
            "resync" => Ok(EnqueueReason::Resync),
            "retry" => Ok(EnqueueReason::Retry),
            other => Err(ModelError::UnknownReason(other.to_string())),
        }
    }
}

/// One queued unit of reconcile work.
///
/// Requests for the same key coalesce on the queue: reconciliation re-reads live state,
/// so only the key matters and the latest reason/time is kept for diagnostics.
#[derive(Clone, Debug)]
pub struct ReconcileRequest {
    pub key: TagKey,
    pub reason: EnqueueReason,
    pub enqueued_at: Instant,
}

impl ReconcileRequest {
    pub fn new(key: TagKey, reason: EnqueueReason) -> Self {
        Self {
            key,
            reason,
            enqueued_at: Instant::now(),
        }
    }

    pub fn event(key: TagKey) -> Self {
        Self::new(key, EnqueueReason::Event)
    }

    pub fn resync(key: TagKey) -> Self {
        Self::new(key, EnqueueReason::Resync)
    }

    pub fn retry(key: TagKey) -> Self {
        Self::new(key, EnqueueReason::Retry)
    }
}
