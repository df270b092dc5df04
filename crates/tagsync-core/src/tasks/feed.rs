use std::{sync::Arc, time::Duration};

use taskvisor::{TaskError, TaskFn, TaskRef, TaskSpec};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{Always, OnFailure, RESYNC_TASK, TAG_POLL_TASK, WATCH_TASK, every, restart_loop};
use crate::{
    map::to_task_spec,
    reconcile::Resyncer,
    tags::{ChangeSource, FileTagSource},
};

/// Full resync sweep every `interval`.
pub fn resync_task(resync: Arc<Resyncer>, interval: Duration) -> TaskSpec {
    let task: TaskRef = TaskFn::arc(RESYNC_TASK, move |ctx: CancellationToken| {
        let resync = Arc::clone(&resync);
        async move {
            if ctx.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            resync
                .sweep()
                .await
                .map(|_| ())
                .map_err(|e| TaskError::Fail {
                    reason: format!("resync sweep failed: {e}"),
                })
        }
    });
    to_task_spec(task, Always, &every(interval), None)
}

/// Forward change notifications into the queue.
///
/// The source outlives task restarts; a closed source ends the task for good.
pub fn watch_task(
    resync: Arc<Resyncer>,
    source: Arc<Mutex<Box<dyn ChangeSource>>>,
) -> TaskSpec {
    let task: TaskRef = TaskFn::arc(WATCH_TASK, move |ctx: CancellationToken| {
        let resync = Arc::clone(&resync);
        let source = Arc::clone(&source);
        async move {
            let mut source = source.lock().await;
            resync.pump(&mut **source, ctx.clone()).await;
            if !ctx.is_cancelled() {
                warn!("change source closed; relying on periodic resync");
            }
            Ok(())
        }
    });
    to_task_spec(task, OnFailure, &restart_loop(), None)
}

/// Re-read a file-backed tag inventory every `interval`.
pub fn tag_poll_task(source: Arc<FileTagSource>, interval: Duration) -> TaskSpec {
    let task: TaskRef = TaskFn::arc(TAG_POLL_TASK, move |ctx: CancellationToken| {
        let source = Arc::clone(&source);
        async move {
            if ctx.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            source
                .refresh()
                .await
                .map(|_| ())
                .map_err(|e| TaskError::Fail {
                    reason: format!("tag refresh failed: {e}"),
                })
        }
    });
    to_task_spec(task, Always, &every(interval), Some(interval))
}
