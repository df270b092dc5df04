#![cfg(feature = "subscriber")]

//! Supervisor event logging.
//!
//! Maps taskvisor events to tracing records. Periodic controller tasks (leader tick, catalog
//! reload) start every few seconds, so routine lifecycle events stay at debug/trace and only
//! failures surface at warn/error.

use async_trait::async_trait;
use taskvisor::{Event, EventKind, Subscribe};
use tracing::{debug, error, info, trace, warn};

/// Subscriber that logs supervisor events.
#[derive(Default)]
pub struct Subscriber;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 2048;

#[async_trait]
impl Subscribe for Subscriber {
    async fn on_event(&self, event: &Event) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "tagsync-log"
    }

    fn queue_capacity(&self) -> usize {
        SUBSCRIBER_QUEUE_CAPACITY
    }
}

fn log_event(e: &Event) {
    let task = e.task.as_deref().unwrap_or("unknown");
    let reason = e.reason.as_deref().unwrap_or("unknown");
    let attempt = e.attempt.unwrap_or(0);

    match e.kind {
        EventKind::ShutdownRequested => info!("shutdown requested; stopping controller tasks"),
        EventKind::AllStoppedWithinGrace => info!("all controller tasks stopped within grace period"),
        EventKind::GraceExceeded => warn!("grace period exceeded; some tasks did not stop in time"),

        EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
            error!(task, reason, "event subscriber failure")
        }
        EventKind::ActorExhausted => warn!(task, reason, "task will not be restarted"),
        EventKind::ActorDead => error!(task, reason, "task terminated permanently"),
        EventKind::TimeoutHit => warn!(
            task,
            timeout_ms = e.timeout_ms.unwrap_or(0),
            "task exceeded its timeout"
        ),

        EventKind::TaskStarting => trace!(task, attempt, "task starting"),
        EventKind::TaskStopped => trace!(task, "task stopped"),
        EventKind::TaskFailed => warn!(task, attempt, reason, "task run failed"),

        // Periodic tasks schedule their next run through backoff too; only failures carry a reason.
        EventKind::BackoffScheduled => match e.reason.as_deref() {
            Some(reason) => debug!(
                task,
                attempt,
                delay_ms = e.delay_ms.unwrap_or(0),
                reason,
                "retry scheduled after failure"
            ),
            None => trace!(task, delay_ms = e.delay_ms.unwrap_or(0), "next run scheduled"),
        },

        EventKind::TaskAdded => debug!(task, "task added"),
        _ => trace!(task, kind = ?e.kind, "supervisor event"),
    }
}
