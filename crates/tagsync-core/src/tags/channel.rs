use async_trait::async_trait;
use tagsync_model::TagChange;
use tokio::sync::mpsc;

use super::ChangeSource;

/// Create a bounded change channel.
pub fn change_channel(capacity: usize) -> (ChangeNotifier, ChannelChangeSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChangeNotifier { tx }, ChannelChangeSource { rx })
}

/// Producer side of a change channel.
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<TagChange>,
}

impl ChangeNotifier {
    /// Send a change, waiting for capacity. Returns `false` if the source was dropped.
    pub async fn notify(&self, change: TagChange) -> bool {
        self.tx.send(change).await.is_ok()
    }
}

/// [`ChangeSource`] backed by an mpsc receiver.
#[derive(Debug)]
pub struct ChannelChangeSource {
    rx: mpsc::Receiver<TagChange>,
}

#[async_trait]
impl ChangeSource for ChannelChangeSource {
    async fn next_change(&mut self) -> Option<TagChange> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsync_model::{ChangeKind, TagKey};

    #[tokio::test]
    async fn source_closes_when_notifiers_drop() {
        let (notifier, mut source) = change_channel(4);
        let change = TagChange::new(TagKey::new("ci", "builder", "v1"), ChangeKind::Created);

        assert!(notifier.notify(change.clone()).await);
        drop(notifier);

        assert_eq!(source.next_change().await, Some(change));
        assert_eq!(source.next_change().await, None);
    }
}
