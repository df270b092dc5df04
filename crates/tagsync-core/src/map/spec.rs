use std::time::Duration;

use tagsync_model::BackoffStrategy;
use taskvisor::{RestartPolicy, TaskRef, TaskSpec};

use super::to_backoff_policy;

pub fn to_task_spec(
    task: TaskRef,
    restart: RestartPolicy,
    backoff: &BackoffStrategy,
    timeout: Option<Duration>,
) -> TaskSpec {
    TaskSpec::new(task, restart, to_backoff_policy(backoff), timeout)
}
