use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry,
    TextEncoder, proto::MetricFamily,
};

use tagsync_core::{LaunchOutcome, MetricsBackend, ReconcileState};

const NAMESPACE: &str = "tagsync";

/// Prometheus metrics backend.
///
/// ## Label cardinality
/// All labels are bounded:
/// - `state`: "succeeded", "skipped", "retrying", "permanently_failed"
/// - `outcome`: "launched", "dry_run", "transient", "permanent", "timeout"
/// - `result`: "success", "failure"
#[derive(Clone)]
pub struct PrometheusMetrics {
    reconciles: CounterVec,
    reconcile_duration: Histogram,
    launches: CounterVec,
    catalog_reloads: CounterVec,
    catalog_reload_errors: IntCounter,
    leader: IntGauge,
    queue_depth: IntGauge,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create the backend and register its collectors in `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let reconciles = CounterVec::new(
            Opts::new("reconcile_total", "Reconcile requests settled, by resulting state")
                .namespace(NAMESPACE),
            &["state"],
        )?;
        registry.register(Box::new(reconciles.clone()))?;

        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new(
                "reconcile_duration_seconds",
                "Time spent settling one reconcile request",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        let launches = CounterVec::new(
            Opts::new("launch_total", "Job launch attempts, by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(launches.clone()))?;

        let catalog_reloads = CounterVec::new(
            Opts::new("catalog_reload_total", "Job catalog reload attempts").namespace(NAMESPACE),
            &["result"],
        )?;
        registry.register(Box::new(catalog_reloads.clone()))?;

        let catalog_reload_errors = IntCounter::with_opts(
            Opts::new(
                "catalog_reload_errors_total",
                "Failed job catalog reloads; the previous snapshot stays in use",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(catalog_reload_errors.clone()))?;

        let leader = IntGauge::with_opts(
            Opts::new("leader", "1 while this instance holds the leader lease").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(leader.clone()))?;

        let queue_depth = IntGauge::with_opts(
            Opts::new("queue_depth", "Reconcile requests waiting in the queue").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            reconciles,
            reconcile_duration,
            launches,
            catalog_reloads,
            catalog_reload_errors,
            leader,
            queue_depth,
            registry,
        })
    }

    /// Create the backend with a private registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metric families.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render the text exposition format served on `/metrics`.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Content type of [`PrometheusMetrics::encode`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_reconcile(&self, state: ReconcileState, duration_ms: u64) {
        self.reconciles.with_label_values(&[state.as_label()]).inc();
        self.reconcile_duration.observe(duration_ms as f64 / 1000.0);
    }

    fn record_launch(&self, outcome: LaunchOutcome) {
        self.launches.with_label_values(&[outcome.as_label()]).inc();
    }

    fn record_catalog_reload(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.catalog_reloads.with_label_values(&[result]).inc();
        if !success {
            self.catalog_reload_errors.inc();
        }
    }

    fn set_leader(&self, held: bool) {
        self.leader.set(i64::from(held));
    }

    fn set_queue_depth(&self, depth: usize) {
        self.queue_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("metric {name} not found"))
    }

    #[test]
    fn reconcile_states_are_labelled() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_reconcile(ReconcileState::Succeeded, 120);
        metrics.record_reconcile(ReconcileState::Skipped, 1);
        metrics.record_reconcile(ReconcileState::Skipped, 2);

        let families = metrics.gather();
        assert_eq!(family(&families, "tagsync_reconcile_total").get_metric().len(), 2);
        assert_eq!(
            family(&families, "tagsync_reconcile_duration_seconds").get_metric().len(),
            1
        );
    }

    #[test]
    fn failed_reload_bumps_error_counter() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.record_catalog_reload(true);
        metrics.record_catalog_reload(false);

        let body = metrics.encode().unwrap();
        assert!(body.contains("tagsync_catalog_reload_errors_total 1"));
        assert!(body.contains(r#"tagsync_catalog_reload_total{result="failure"} 1"#));
        assert!(body.contains(r#"tagsync_catalog_reload_total{result="success"} 1"#));
    }

    #[test]
    fn gauges_follow_latest_value() {
        let metrics = PrometheusMetrics::new().unwrap();

        metrics.set_leader(true);
        metrics.set_leader(false);
        metrics.set_queue_depth(7);

        let body = metrics.encode().unwrap();
        assert!(body.contains("tagsync_leader 0"));
        assert!(body.contains("tagsync_queue_depth 7"));
    }

    #[test]
    fn launch_outcomes_are_labelled() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_launch(LaunchOutcome::DryRun);

        let body = metrics.encode().unwrap();
        assert!(body.contains(r#"tagsync_launch_total{outcome="dry_run"} 1"#));
    }

    #[test]
    fn custom_registry_is_used() {
        let registry = Arc::new(Registry::new());
        let metrics = PrometheusMetrics::new_with_registry(registry.clone()).unwrap();

        metrics.set_queue_depth(1);
        assert!(!registry.gather().is_empty());
    }
}
