use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use tagsync_model::{TagChange, TagInfo};
use tracing::{debug, instrument};

use super::{ChangeNotifier, MemoryTagStore, TagStoreError};

/// Tag inventory read from a JSON file.
///
/// Each [`FileTagSource::refresh`] re-reads the file, replaces the content of the shared
/// [`MemoryTagStore`] and forwards the diff to the notifier. Run it periodically to turn a
/// static inventory into a change stream.
pub struct FileTagSource {
    path: PathBuf,
    namespace: Option<String>,
    store: Arc<MemoryTagStore>,
    notifier: ChangeNotifier,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagFile {
    Wrapped { tags: Vec<TagInfo> },
    List(Vec<TagInfo>),
}

impl FileTagSource {
    pub fn new(path: impl Into<PathBuf>, store: Arc<MemoryTagStore>, notifier: ChangeNotifier) -> Self {
        Self {
            path: path.into(),
            namespace: None,
            store,
            notifier,
        }
    }

    /// Only keep tags of `namespace`.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> Arc<MemoryTagStore> {
        Arc::clone(&self.store)
    }

    /// Read the file, update the store and publish the changes.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub async fn refresh(&self) -> Result<Vec<TagChange>, TagStoreError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| TagStoreError::Unavailable(format!("{}: {e}", self.path.display())))?;
        let tags = match serde_json::from_slice::<TagFile>(&raw)
            .map_err(|e| TagStoreError::Parse(format!("{}: {e}", self.path.display())))?
        {
            TagFile::Wrapped { tags } | TagFile::List(tags) => tags,
        };

        let tags: Vec<TagInfo> = match &self.namespace {
            Some(ns) => tags.into_iter().filter(|t| t.key.namespace() == ns).collect(),
            None => tags,
        };

        let changes = self.store.replace_all(tags);
        for change in &changes {
            if !self.notifier.notify(change.clone()).await {
                debug!("change source closed; dropping notifications");
                break;
            }
        }
        if !changes.is_empty() {
            debug!(changes = changes.len(), "tag inventory changed");
        }
        Ok(changes)
    }
}
