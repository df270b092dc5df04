//! Job catalog: the periodically reloaded mapping from organization/repository/branch to jobs.
mod cache;
pub use cache::ConfigCache;

mod file;
pub use file::FileCatalogSource;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tagsync_model::{CatalogKey, JobCatalogEntry};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog source unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse catalog: {0}")]
    Parse(String),

    #[error("duplicate catalog entry for {0}")]
    Duplicate(CatalogKey),
}

/// External source the catalog is loaded from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Source name used in logs.
    fn name(&self) -> &'static str;

    /// Load a complete catalog. Partial results are never returned.
    async fn load(&self) -> Result<Catalog, CatalogError>;
}

/// Immutable catalog snapshot.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: HashMap<CatalogKey, Arc<JobCatalogEntry>>,
}

impl Catalog {
    /// Build a snapshot, rejecting two entries for the same key.
    pub fn from_entries<I>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = JobCatalogEntry>,
    {
        let mut map = HashMap::new();
        for entry in entries {
            let key = entry.key();
            if map.contains_key(&key) {
                return Err(CatalogError::Duplicate(key));
            }
            map.insert(key, Arc::new(entry));
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, key: &CatalogKey) -> Option<&Arc<JobCatalogEntry>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_entries_rejects_duplicates() {
        let entries = vec![
            JobCatalogEntry::new("acme", "widgets", "main"),
            JobCatalogEntry::new("acme", "widgets", "main"),
        ];

        match Catalog::from_entries(entries) {
            Err(CatalogError::Duplicate(key)) => assert_eq!(key.to_string(), "acme/widgets@main"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn get_finds_entry_by_full_key() {
        let catalog = Catalog::from_entries(vec![
            JobCatalogEntry::new("acme", "widgets", "main"),
            JobCatalogEntry::new("acme", "widgets", "release-1.0"),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get(&CatalogKey::new("acme", "widgets", "main")).is_some());
        assert!(catalog.get(&CatalogKey::new("acme", "gadgets", "main")).is_none());
    }
}
