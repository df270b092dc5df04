//! Read access to the watched image-tag resources.
//!
//! [`TagStore`] answers point reads of the live tag state; [`ChangeSource`] delivers
//! created/updated/deleted notifications. The engine only ever enqueues keys from a change
//! and re-reads the live state when it processes them.
mod channel;
pub use channel::{ChangeNotifier, ChannelChangeSource, change_channel};

mod memory;
pub use memory::MemoryTagStore;

mod file;
pub use file::FileTagSource;

use async_trait::async_trait;
use tagsync_model::{TagChange, TagInfo, TagKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagStoreError {
    #[error("tag store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse tag data: {0}")]
    Parse(String),
}

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Current state of the tag, `None` if it no longer exists.
    async fn get(&self, key: &TagKey) -> Result<Option<TagInfo>, TagStoreError>;

    /// Every known tag, for full resyncs.
    async fn list(&self) -> Result<Vec<TagKey>, TagStoreError>;
}

#[async_trait]
pub trait ChangeSource: Send {
    /// Next change notification; `None` once the source is closed.
    async fn next_change(&mut self) -> Option<TagChange>;
}
