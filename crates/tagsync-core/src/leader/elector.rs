use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use super::{LeaderGate, LeaseBackend, LeaseError};
use crate::metrics::{MetricsHandle, noop_metrics};

/// Election timing and identity.
///
/// Defaults follow the usual controller settings: 15s lease, 10s renew deadline, 2s retry period.
#[derive(Clone, Debug)]
pub struct LeaderElectionConfig {
    /// Identity written into the lease; must be unique within the fleet.
    pub identity: String,
    /// Lease TTL requested on acquire and renew.
    pub lease_duration: Duration,
    /// How long a leader keeps leadership while renewals keep failing.
    pub renew_deadline: Duration,
    /// Interval between election ticks.
    pub retry_period: Duration,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            identity: "tagsync".to_string(),
            lease_duration: Duration::from_secs(15),
            renew_deadline: Duration::from_secs(10),
            retry_period: Duration::from_secs(2),
        }
    }
}

/// Result of one election tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderTransition {
    /// Became leader on this tick.
    Acquired,
    /// Was leader and still is.
    Held,
    /// Was leader and stepped down.
    Lost,
    /// Not leader; someone else holds the lease or the backend is unreachable.
    Standby,
}

/// Drives a [`LeaseBackend`] and publishes leadership through a [`LeaderGate`].
pub struct LeaderElector {
    backend: Arc<dyn LeaseBackend>,
    cfg: LeaderElectionConfig,
    gate: Arc<LeaderGate>,
    last_renewed: Mutex<Option<Instant>>,
    metrics: MetricsHandle,
}

impl LeaderElector {
    pub fn new(backend: Arc<dyn LeaseBackend>, cfg: LeaderElectionConfig) -> Self {
        Self {
            backend,
            cfg,
            gate: Arc::new(LeaderGate::new()),
            last_renewed: Mutex::new(None),
            metrics: noop_metrics(),
        }
    }

    /// Replace the metrics backend and return updated elector.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Gate observed by the workers.
    pub fn gate(&self) -> Arc<LeaderGate> {
        Arc::clone(&self.gate)
    }

    pub fn identity(&self) -> &str {
        &self.cfg.identity
    }

    pub fn config(&self) -> &LeaderElectionConfig {
        &self.cfg
    }

    pub fn is_held(&self) -> bool {
        self.gate.is_leader()
    }

    /// Run one election round: renew if leader, try to acquire otherwise.
    #[instrument(level = "trace", skip(self), fields(identity = %self.cfg.identity, backend = self.backend.name()))]
    pub async fn tick(&self) -> LeaderTransition {
        if self.gate.is_leader() {
            self.renew().await
        } else {
            self.acquire().await
        }
    }

    /// Step down and release the lease.
    ///
    /// Called on shutdown so a standby can take over immediately.
    pub async fn release(&self) -> Result<(), LeaseError> {
        if self.step_down() {
            self.backend.release(&self.cfg.identity).await?;
            info!(identity = %self.cfg.identity, "leader lease released");
        }
        Ok(())
    }

    async fn acquire(&self) -> LeaderTransition {
        match self
            .backend
            .try_acquire(&self.cfg.identity, self.cfg.lease_duration)
            .await
        {
            Ok(true) => {
                self.mark_renewed();
                self.gate.set(true);
                self.metrics.set_leader(true);
                info!(identity = %self.cfg.identity, "acquired leader lease");
                LeaderTransition::Acquired
            }
            Ok(false) => {
                trace!("lease held by another instance; standing by");
                LeaderTransition::Standby
            }
            Err(e) => {
                debug!(error = %e, "lease acquisition failed");
                LeaderTransition::Standby
            }
        }
    }

    async fn renew(&self) -> LeaderTransition {
        match self
            .backend
            .renew(&self.cfg.identity, self.cfg.lease_duration)
            .await
        {
            Ok(true) => {
                self.mark_renewed();
                LeaderTransition::Held
            }
            Ok(false) => {
                warn!(identity = %self.cfg.identity, "leader lease taken over by another holder");
                self.step_down();
                LeaderTransition::Lost
            }
            Err(e) => {
                let since = self.since_renewed();
                let since_ms = u64::try_from(since.as_millis()).unwrap_or(u64::MAX);
                if since >= self.cfg.renew_deadline {
                    warn!(
                        error = %e,
                        since_ms,
                        "failed to renew leader lease within deadline; stepping down"
                    );
                    self.step_down();
                    LeaderTransition::Lost
                } else {
                    debug!(error = %e, since_ms, "lease renewal failed; retrying");
                    LeaderTransition::Held
                }
            }
        }
    }

    /// Clear leadership; returns `true` if this instance was leader.
    fn step_down(&self) -> bool {
        let was = self.gate.set(false);
        *self.last_renewed.lock().unwrap_or_else(PoisonError::into_inner) = None;
        if was {
            self.metrics.set_leader(false);
        }
        was
    }

    fn mark_renewed(&self) {
        *self.last_renewed.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn since_renewed(&self) -> Duration {
        self.last_renewed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|at| at.elapsed())
            .unwrap_or(Duration::MAX)
    }
}
