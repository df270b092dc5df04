use std::{
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{LeaseBackend, LeaseError};

/// In-process lease backend.
///
/// Electors sharing one instance (through an `Arc`) compete for the same lease.
/// Suitable for single-node deployments and tests; expiry follows the tokio clock.
#[derive(Debug)]
pub struct MemoryLeaseBackend {
    lease: Mutex<Option<(String, Instant)>>,
    available: AtomicBool,
}

impl Default for MemoryLeaseBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLeaseBackend {
    pub fn new() -> Self {
        Self {
            lease: Mutex::new(None),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Current holder, if the lease is held and not expired.
    pub fn holder(&self) -> Option<String> {
        let lease = self.lease.lock().unwrap_or_else(PoisonError::into_inner);
        lease
            .as_ref()
            .filter(|(_, expires)| Instant::now() < *expires)
            .map(|(holder, _)| holder.clone())
    }

    fn check(&self) -> Result<(), LeaseError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(LeaseError::Unavailable("memory backend marked unavailable".into()))
        }
    }
}

#[async_trait]
impl LeaseBackend for MemoryLeaseBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn try_acquire(&self, holder: &str, ttl: Duration) -> Result<bool, LeaseError> {
        self.check()?;
        let now = Instant::now();
        let mut lease = self.lease.lock().unwrap_or_else(PoisonError::into_inner);

        let free = match lease.as_ref() {
            None => true,
            Some((current, expires)) => current == holder || now >= *expires,
        };
        if free {
            *lease = Some((holder.to_string(), now + ttl));
        }
        Ok(free)
    }

    async fn renew(&self, holder: &str, ttl: Duration) -> Result<bool, LeaseError> {
        self.check()?;
        let mut lease = self.lease.lock().unwrap_or_else(PoisonError::into_inner);

        match lease.as_mut() {
            Some((current, expires)) if current == holder => {
                *expires = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, holder: &str) -> Result<(), LeaseError> {
        self.check()?;
        let mut lease = self.lease.lock().unwrap_or_else(PoisonError::into_inner);

        if lease.as_ref().is_some_and(|(current, _)| current == holder) {
            *lease = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn renew_fails_for_foreign_holder() {
        let backend = MemoryLeaseBackend::new();
        let ttl = Duration::from_secs(10);

        assert!(backend.try_acquire("a", ttl).await.unwrap());
        assert!(!backend.renew("b", ttl).await.unwrap());
        assert!(backend.renew("a", ttl).await.unwrap());
        assert_eq!(backend.holder().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn release_by_other_holder_is_noop() {
        let backend = MemoryLeaseBackend::new();
        backend.try_acquire("a", Duration::from_secs(10)).await.unwrap();

        backend.release("b").await.unwrap();
        assert_eq!(backend.holder().as_deref(), Some("a"));

        backend.release("a").await.unwrap();
        assert!(backend.holder().is_none());
    }
}
