//! Background tasks run under the taskvisor supervisor.
//!
//! Periodic tasks (catalog reload, resync sweep, leader tick, tag polling) use
//! [`taskvisor::RestartPolicy::Always`] with the period as success delay. Long-running loops (workers,
//! watch pump) use [`taskvisor::RestartPolicy::OnFailure`] and return `Ok` when cancelled.
mod feed;
pub use feed::{resync_task, tag_poll_task, watch_task};

mod catalog;
pub use catalog::catalog_reload_task;

mod leader;
pub(crate) use leader::leader_tick;
pub use leader::leader_task;

mod worker;
pub use worker::worker_task;

use std::time::Duration;

use tagsync_model::{BackoffStrategy, JitterStrategy};
use taskvisor::RestartPolicy::{Always, OnFailure};

pub const CATALOG_RELOAD_TASK: &str = "tagsync-catalog-reload";
pub const RESYNC_TASK: &str = "tagsync-resync";
pub const LEADER_TASK: &str = "tagsync-leader";
pub const WATCH_TASK: &str = "tagsync-watch";
pub const TAG_POLL_TASK: &str = "tagsync-tag-poll";

/// First retry delay for a failed periodic run.
const FAILURE_FIRST_MS: u64 = 1_000;
/// Cap for restart delays of long-running loops.
const LOOP_MAX_MS: u64 = 30_000;

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Backoff for a task repeated every `period`.
fn every(period: Duration) -> BackoffStrategy {
    BackoffStrategy::periodic(millis(period), FAILURE_FIRST_MS)
}

/// Backoff for a task repeated every `period` without jitter.
fn every_exact(period: Duration) -> BackoffStrategy {
    BackoffStrategy {
        jitter: JitterStrategy::None,
        ..every(period)
    }
}

/// Backoff for long-running loops restarted after failures.
fn restart_loop() -> BackoffStrategy {
    BackoffStrategy::on_failure(FAILURE_FIRST_MS, LOOP_MAX_MS)
}
