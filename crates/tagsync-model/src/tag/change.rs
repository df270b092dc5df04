use serde::{Deserialize, Serialize};

use super::TagKey;

/// Kind of change reported by a watch.
///
/// The engine treats all kinds alike: every change re-reads live state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// Change notification for one tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagChange {
    pub key: TagKey,
    pub kind: ChangeKind,
}

impl TagChange {
    pub fn new(key: TagKey, kind: ChangeKind) -> Self {
        Self { key, kind }
    }
}
