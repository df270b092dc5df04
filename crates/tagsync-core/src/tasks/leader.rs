use std::sync::Arc;

use taskvisor::{TaskError, TaskFn, TaskRef, TaskSpec};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{Always, LEADER_TASK, every_exact};
use crate::{
    leader::{LeaderElector, LeaderTransition},
    map::to_task_spec,
    reconcile::Resyncer,
};

/// Run one election round every retry period.
///
/// Winning the lease triggers a full resync: queue content gathered while on standby may be
/// stale or incomplete.
pub fn leader_task(elector: Arc<LeaderElector>, resync: Arc<Resyncer>) -> TaskSpec {
    let period = elector.config().retry_period;
    let timeout = elector.config().lease_duration;

    let task: TaskRef = TaskFn::arc(LEADER_TASK, move |ctx: CancellationToken| {
        let elector = Arc::clone(&elector);
        let resync = Arc::clone(&resync);
        async move {
            if ctx.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            leader_tick(&elector, &resync).await;
            Ok(())
        }
    });
    to_task_spec(task, Always, &every_exact(period), Some(timeout))
}

/// Tick the elector and resync on acquisition.
pub(crate) async fn leader_tick(elector: &LeaderElector, resync: &Resyncer) -> LeaderTransition {
    let transition = elector.tick().await;
    if transition == LeaderTransition::Acquired {
        info!(identity = %elector.identity(), "became leader; starting full resync");
        if let Err(e) = resync.sweep().await {
            error!(error = %e, "resync after acquiring leadership failed");
        }
    }
    transition
}
