use std::sync::{
    Arc, PoisonError, RwLock,
    atomic::{AtomicU64, Ordering},
};

use tagsync_model::{CatalogKey, JobCatalogEntry};
use tracing::{debug, instrument, warn};

use super::{Catalog, CatalogError, CatalogSource};
use crate::metrics::{MetricsHandle, noop_metrics};

/// In-memory job catalog refreshed from a [`CatalogSource`].
///
/// Readers clone the current `Arc<Catalog>` and work on that immutable snapshot;
/// a reload builds a complete new snapshot and swaps it in with one write.
/// Lookups therefore see either the old or the new catalog, never a mix.
///
/// A failed reload keeps the previous snapshot and bumps [`ConfigCache::reload_errors`].
pub struct ConfigCache {
    source: Arc<dyn CatalogSource>,
    snapshot: RwLock<Arc<Catalog>>,
    generation: AtomicU64,
    reload_errors: AtomicU64,
    metrics: MetricsHandle,
}

impl ConfigCache {
    /// Create a cache with an empty snapshot (generation 0).
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(Catalog::default())),
            generation: AtomicU64::new(0),
            reload_errors: AtomicU64::new(0),
            metrics: noop_metrics(),
        }
    }

    /// Replace the metrics backend and return updated cache.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Create a cache and perform the initial load.
    ///
    /// Unlike [`ConfigCache::reload`], a failure here is returned to the caller: without a first
    /// catalog the controller must not start.
    pub async fn load(
        source: Arc<dyn CatalogSource>,
        metrics: MetricsHandle,
    ) -> Result<Self, CatalogError> {
        let catalog = source.load().await?;
        let cache = Self::new(source).with_metrics(metrics);
        cache.install(catalog);
        Ok(cache)
    }

    /// Point lookup by organization, repository and branch.
    pub fn lookup(&self, org: &str, repo: &str, branch: &str) -> Option<Arc<JobCatalogEntry>> {
        self.snapshot()
            .get(&CatalogKey::new(org, repo, branch))
            .cloned()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Reload the catalog from the source.
    ///
    /// On error the previous snapshot stays installed.
    #[instrument(level = "debug", skip(self), fields(source = self.source.name()))]
    pub async fn reload(&self) -> Result<(), CatalogError> {
        match self.source.load().await {
            Ok(catalog) => {
                let entries = catalog.len();
                self.install(catalog);
                self.metrics.record_catalog_reload(true);
                debug!(entries, generation = self.generation(), "catalog reloaded");
                Ok(())
            }
            Err(e) => {
                let errors = self.reload_errors.fetch_add(1, Ordering::Relaxed) + 1;
                self.metrics.record_catalog_reload(false);
                warn!(error = %e, errors, "catalog reload failed; keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Number of installed snapshots.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of failed reloads since creation.
    pub fn reload_errors(&self) -> u64 {
        self.reload_errors.load(Ordering::Relaxed)
    }

    fn install(&self, catalog: Catalog) {
        let next = Arc::new(catalog);
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
