use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Shared "is leader" flag.
///
/// Written only by the [`super::LeaderElector`], read by every worker.
#[derive(Debug, Default)]
pub struct LeaderGate {
    held: AtomicBool,
    changed: Notify,
}

impl LeaderGate {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_leader(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Set the flag and return its previous value.
    pub(crate) fn set(&self, held: bool) -> bool {
        let prev = self.held.swap(held, Ordering::AcqRel);
        if prev != held {
            self.changed.notify_waiters();
        }
        prev
    }

    /// Resolve once this instance holds leadership.
    pub async fn wait_for_leadership(&self) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_leader() {
                return;
            }
            notified.await;
        }
    }
}
