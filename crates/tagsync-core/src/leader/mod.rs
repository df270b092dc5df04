//! Lease-based leader election.
//!
//! Exactly one instance of a redundant fleet holds the lease and runs the reconcile workers.
//! The [`LeaderElector`] drives a [`LeaseBackend`] and publishes the result through a
//! [`LeaderGate`] that workers read with a single atomic load.
mod elector;
pub use elector::{LeaderElectionConfig, LeaderElector, LeaderTransition};

mod gate;
pub use gate::LeaderGate;

mod memory;
pub use memory::MemoryLeaseBackend;

mod file;
pub use file::FileLeaseBackend;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease backend unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt lease record: {0}")]
    Corrupt(String),
}

/// Lease record as stored by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseState {
    pub holder: String,
    /// Lease expiry in unix milliseconds.
    pub expires_at_ms: u64,
}

impl LeaseState {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Shared coordination store all instances of the fleet can see.
#[async_trait]
pub trait LeaseBackend: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Take the lease if it is free, expired or already ours. Returns `true` if `holder` now holds it.
    async fn try_acquire(&self, holder: &str, ttl: Duration) -> Result<bool, LeaseError>;

    /// Extend a lease held by `holder`. Returns `false` if someone else holds it.
    async fn renew(&self, holder: &str, ttl: Duration) -> Result<bool, LeaseError>;

    /// Give the lease up so a standby can take over without waiting for expiry.
    ///
    /// Releasing a lease held by someone else is a no-op.
    async fn release(&self, holder: &str) -> Result<(), LeaseError>;
}
