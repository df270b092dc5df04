use crate::metrics::backend::{LaunchOutcome, MetricsBackend};
use crate::reconcile::ReconcileState;

/// No-op metrics backend that compiles to nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_reconcile(&self, _: ReconcileState, _: u64) {}

    #[inline(always)]
    fn record_launch(&self, _: LaunchOutcome) {}

    #[inline(always)]
    fn record_catalog_reload(&self, _: bool) {}

    #[inline(always)]
    fn set_leader(&self, _: bool) {}

    #[inline(always)]
    fn set_queue_depth(&self, _: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_is_zero_size() {
        assert_eq!(std::mem::size_of::<NoOpMetrics>(), 0);
    }
}
