use std::fmt;

use serde::{Deserialize, Serialize};

use super::TagKey;
use crate::CatalogKey;

/// Source repository an image tag was built from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub org: String,
    pub repo: String,
    pub branch: String,
}

impl SourceRef {
    pub fn new(org: impl Into<String>, repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Key under which the job catalog stores jobs for this source.
    pub fn catalog_key(&self) -> CatalogKey {
        CatalogKey::new(&self.org, &self.repo, &self.branch)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.org, self.repo, self.branch)
    }
}

/// Live state of a watched tag, as read from the tag store.
///
/// `source` is `None` when the tag carries no build provenance; such tags are never reconciled into a launch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    #[serde(flatten)]
    pub key: TagKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
    /// Creation time in unix milliseconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_ms: Option<u64>,
}

impl TagInfo {
    pub fn new(key: TagKey, source: Option<SourceRef>) -> Self {
        Self {
            key,
            source,
            created_ms: None,
        }
    }

    pub fn with_created_ms(mut self, created_ms: u64) -> Self {
        self.created_ms = Some(created_ms);
        self
    }

    /// Returns `true` if the tag was created less than `grace_ms` before `now_ms`.
    ///
    /// Tags without a creation time are never considered new.
    pub fn is_new(&self, now_ms: u64, grace_ms: u64) -> bool {
        match self.created_ms {
            Some(created) => now_ms.saturating_sub(created) < grace_ms,
            None => false,
        }
    }
}
