//! Prometheus backend for the controller metrics.
//!
//! [`PrometheusMetrics`] implements [`tagsync_core::MetricsBackend`]; hand a clone to the
//! controller and call [`PrometheusMetrics::encode`] from the `/metrics` handler.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tagsync_core::{MetricsBackend, MetricsHandle};
//! use tagsync_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let handle: MetricsHandle = Arc::new(metrics.clone());
//! handle.set_leader(true);
//!
//! let body = metrics.encode()?;
//! assert!(body.contains("tagsync_leader 1"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `tagsync_reconcile_total{state}` - Counter
//! - `tagsync_reconcile_duration_seconds` - Histogram
//! - `tagsync_launch_total{outcome}` - Counter
//! - `tagsync_catalog_reload_total{result}` - Counter
//! - `tagsync_catalog_reload_errors_total` - Counter
//! - `tagsync_leader` - Gauge (1 while this instance holds the lease)
//! - `tagsync_queue_depth` - Gauge
mod backend;
pub use backend::PrometheusMetrics;
