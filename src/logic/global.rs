//! Cross-channel aggregates.

use chatsync_proto::ChannelKey;
use dashmap::DashMap;
use tokio::sync::watch;

/// Aggregate unread count across all active channel coordinators.
///
/// Channel coordinators report their own count; the total is republished on
/// every change.
pub struct GlobalState {
    unread: DashMap<ChannelKey, u32>,
    total_unread: watch::Sender<u32>,
}

impl GlobalState {
    pub fn new() -> Self {
        let (total_unread, _) = watch::channel(0);
        Self {
            unread: DashMap::new(),
            total_unread,
        }
    }

    pub fn set_unread(&self, cid: &ChannelKey, count: u32) {
        if count == 0 {
            self.unread.remove(cid);
        } else {
            self.unread.insert(cid.clone(), count);
        }
        self.publish();
    }

    /// Stop counting `cid`, e.g. when its coordinator is torn down.
    pub fn forget(&self, cid: &ChannelKey) {
        if self.unread.remove(cid).is_some() {
            self.publish();
        }
    }

    pub fn total_unread(&self) -> u32 {
        *self.total_unread.borrow()
    }

    pub fn unread_channels(&self) -> usize {
        self.unread.len()
    }

    pub fn subscribe_total_unread(&self) -> watch::Receiver<u32> {
        self.total_unread.subscribe()
    }

    /// Reset every aggregate.
    pub fn clear(&self) {
        self.unread.clear();
        self.publish();
    }

    /// The sum is taken under the watch lock so a stale total never
    /// replaces a newer one.
    fn publish(&self) {
        self.total_unread.send_if_modified(|current| {
            let total = self.unread.iter().map(|e| *e.value()).sum();
            let changed = *current != total;
            *current = total;
            changed
        });
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new()
    }
}
