use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tagsync_model::JobCatalogEntry;

use super::{Catalog, CatalogError, CatalogSource};

/// Catalog stored as a JSON file.
///
/// Accepts either a bare array of entries or `{"entries": [...]}`.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Wrapped { entries: Vec<JobCatalogEntry> },
    List(Vec<JobCatalogEntry>),
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<Catalog, CatalogError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CatalogError::Unavailable(format!("{}: {e}", self.path.display())))?;

        let entries = match serde_json::from_slice::<CatalogFile>(&raw)
            .map_err(|e| CatalogError::Parse(format!("{}: {e}", self.path.display())))?
        {
            CatalogFile::Wrapped { entries } | CatalogFile::List(entries) => entries,
        };
        Catalog::from_entries(entries)
    }
}
