use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Retry discipline for transient launch failures.
///
/// `max_attempts` counts every launch attempt of one settled reconciliation, including the first.
/// The delay before retry `n` (1-based) is `first_ms * factor^(n-1)`, capped at `max_ms`.
/// No jitter is applied, so the attempt count and delays are deterministic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryStrategy {
    pub max_attempts: u32,
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            first_ms: 1_000,
            max_ms: 300_000,
            factor: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Delay before retry number `retry` (the first retry is `1`).
    pub fn delay(&self, retry: u32) -> Duration {
        let exp = self.factor.powi(retry.saturating_sub(1).min(i32::MAX as u32) as i32);
        let ms = (self.first_ms as f64 * exp).min(self.max_ms as f64);
        Duration::from_millis(ms as u64)
    }

    /// Returns `true` once `attempts` launch attempts have been spent.
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.max_attempts == 0 {
            return Err(ModelError::Invalid("retry.maxAttempts must be at least 1".into()));
        }
        if self.first_ms == 0 {
            return Err(ModelError::Invalid("retry.firstMs must be positive".into()));
        }
        if self.max_ms < self.first_ms {
            return Err(ModelError::Invalid("retry.maxMs must not be below retry.firstMs".into()));
        }
        if !(self.factor > 1.0) {
            return Err(ModelError::Invalid("retry.factor must be greater than 1.0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_strictly_until_cap() {
        let r = RetryStrategy::default();
        let delays: Vec<_> = (1..r.max_attempts).map(|n| r.delay(n)).collect();

        assert_eq!(delays[0], Duration::from_secs(1));
        assert!(delays.windows(2).all(|w| w[0] < w[1]), "{delays:?}");
    }

    #[test]
    fn delay_is_capped() {
        let r = RetryStrategy {
            max_attempts: 50,
            first_ms: 1_000,
            max_ms: 10_000,
            factor: 2.0,
        };
        assert_eq!(r.delay(30), Duration::from_millis(10_000));
    }

    #[test]
    fn exhausted_counts_the_first_attempt() {
        let r = RetryStrategy {
            max_attempts: 3,
            ..Default::default()
        };
        assert!(!r.exhausted(2));
        assert!(r.exhausted(3));
    }

    #[test]
    fn validate_rejects_nonsense() {
        let zero = RetryStrategy {
            max_attempts: 0,
            ..Default::default()
        };
        let shrinking = RetryStrategy {
            factor: 0.5,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        assert!(shrinking.validate().is_err());
        assert!(RetryStrategy::default().validate().is_ok());
    }

    #[test]
    fn flat_backoff_is_rejected() {
        let flat = RetryStrategy {
            factor: 1.0,
            ..Default::default()
        };
        assert!(flat.validate().is_err());
        assert!(RetryStrategy { factor: 1.5, ..Default::default() }.validate().is_ok());
    }
}
