use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::Collection;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Put,
    Delete,
}

/// One document changed. Subscribers re-read rather than apply deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub collection: Collection,
    pub id: String,
    pub kind: ChangeKind,
}

/// Broadcast hub, one channel per collection.
pub struct NotifyHub {
    channels: DashMap<Collection, broadcast::Sender<ChangeNotice>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to changes in a collection. Creates the channel if needed.
    pub fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeNotice> {
        self.channels
            .entry(collection)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, notice: ChangeNotice) {
        if let Some(sender) = self.channels.get(&notice.collection) {
            let _ = sender.send(notice);
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, collection: Collection) -> usize {
        self.channels
            .get(&collection)
            .map_or(0, |s| s.receiver_count())
    }
}
