use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use tagsync_model::{ChangeKind, TagChange, TagInfo, TagKey};

use super::{TagStore, TagStoreError};

/// In-memory tag store.
///
/// Write methods report what changed so a feeder can forward the diff as notifications.
#[derive(Debug, Default)]
pub struct MemoryTagStore {
    tags: RwLock<BTreeMap<TagKey, TagInfo>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tag. Returns `None` if the stored value was already identical.
    pub fn upsert(&self, info: TagInfo) -> Option<ChangeKind> {
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);
        match tags.insert(info.key.clone(), info.clone()) {
            None => Some(ChangeKind::Created),
            Some(prev) if prev == info => None,
            Some(_) => Some(ChangeKind::Updated),
        }
    }

    /// Remove a tag; returns `true` if it existed.
    pub fn remove(&self, key: &TagKey) -> bool {
        self.tags
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Replace the whole content and return the resulting changes, in key order.
    pub fn replace_all(&self, next: Vec<TagInfo>) -> Vec<TagChange> {
        let next: BTreeMap<TagKey, TagInfo> =
            next.into_iter().map(|info| (info.key.clone(), info)).collect();
        let mut tags = self.tags.write().unwrap_or_else(PoisonError::into_inner);

        let mut changes = Vec::new();
        for key in tags.keys() {
            if !next.contains_key(key) {
                changes.push(TagChange::new(key.clone(), ChangeKind::Deleted));
            }
        }
        for (key, info) in &next {
            match tags.get(key) {
                None => changes.push(TagChange::new(key.clone(), ChangeKind::Created)),
                Some(prev) if prev != info => {
                    changes.push(TagChange::new(key.clone(), ChangeKind::Updated))
                }
                Some(_) => {}
            }
        }
        changes.sort_by(|a, b| a.key.cmp(&b.key));

        *tags = next;
        changes
    }

    pub fn len(&self) -> usize {
        self.tags.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn get(&self, key: &TagKey) -> Result<Option<TagInfo>, TagStoreError> {
        Ok(self
            .tags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<TagKey>, TagStoreError> {
        Ok(self
            .tags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }
}
