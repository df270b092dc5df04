use std::{sync::Arc, time::Duration};

use taskvisor::{TaskError, TaskFn, TaskRef, TaskSpec};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Always, CATALOG_RELOAD_TASK, every};
use crate::{catalog::ConfigCache, map::to_task_spec};

/// Reload the job catalog every `interval`.
///
/// A failed reload is already counted and logged by the cache and is not a task failure:
/// the next attempt happens on the regular schedule.
pub fn catalog_reload_task(cache: Arc<ConfigCache>, interval: Duration) -> TaskSpec {
    let task: TaskRef = TaskFn::arc(CATALOG_RELOAD_TASK, move |ctx: CancellationToken| {
        let cache = Arc::clone(&cache);
        async move {
            if ctx.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            if let Err(e) = cache.reload().await {
                debug!(error = %e, "catalog reload skipped; previous snapshot stays active");
            }
            Ok(())
        }
    });
    to_task_spec(task, Always, &every(interval), Some(interval))
}
