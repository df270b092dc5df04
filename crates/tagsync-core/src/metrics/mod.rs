//! Metrics collection abstraction for the controller.
//!
//! Backends (prometheus, statsd, etc) implement [`MetricsBackend`] and are injected through
//! constructors of the cache, elector and engine.
mod backend;
pub use backend::{LaunchOutcome, MetricsBackend, MetricsHandle};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
