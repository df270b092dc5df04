use std::sync::Arc;

use taskvisor::{TaskFn, TaskRef, TaskSpec};
use tokio_util::sync::CancellationToken;

use super::{OnFailure, restart_loop};
use crate::{map::to_task_spec, reconcile::Worker};

/// Run a reconcile worker until cancellation.
pub fn worker_task(worker: Arc<Worker>) -> TaskSpec {
    let name = format!("tagsync-worker-{}", worker.id());
    let task: TaskRef = TaskFn::arc(name, move |ctx: CancellationToken| {
        let worker = Arc::clone(&worker);
        async move {
            worker.run(ctx).await;
            Ok(())
        }
    });
    to_task_spec(task, OnFailure, &restart_loop(), None)
}
