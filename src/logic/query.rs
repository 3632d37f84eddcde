//! Channel-list query coordinator.

use super::Coordinator;
use chatsync_proto::{Channel, ChannelKey, QueryFilter, QuerySort};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identity of one channel-list query.
pub type QueryKey = (QueryFilter, QuerySort);

/// Keeps the sorted list of channels matching one filter.
///
/// Channels that stop matching after an update leave the list; channels that
/// start matching join it. Deleted channels never match.
pub struct QueryChannelsLogic {
    filter: QueryFilter,
    sort: QuerySort,
    channels: Mutex<HashMap<ChannelKey, Channel>>,
    cids: watch::Sender<Vec<ChannelKey>>,
    cancel: CancellationToken,
}

impl QueryChannelsLogic {
    pub fn new(key: QueryKey) -> Arc<Self> {
        let (filter, sort) = key;
        let (cids, _) = watch::channel(Vec::new());
        Arc::new(Self {
            filter,
            sort,
            channels: Mutex::new(HashMap::new()),
            cids,
            cancel: CancellationToken::new(),
        })
    }

    pub fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    pub fn sort(&self) -> &QuerySort {
        &self.sort
    }

    /// Add query results. Channels not matching the filter are skipped.
    ///
    /// Returns the number of channels added or replaced.
    pub fn add_channels(&self, channels: Vec<Channel>) -> usize {
        let mut held = self.channels.lock();
        let mut added = 0;
        for channel in channels {
            if self.admits(&channel) {
                held.insert(channel.key.clone(), channel);
                added += 1;
            }
        }
        if added > 0 {
            self.publish(&held);
        }
        added
    }

    /// Apply a channel update. Returns `true` if the list changed.
    pub fn on_channel_updated(&self, channel: Channel) -> bool {
        if self.is_torn_down() {
            return false;
        }
        let mut held = self.channels.lock();
        let changed = if self.admits(&channel) {
            held.insert(channel.key.clone(), channel.clone()).as_ref() != Some(&channel)
        } else {
            held.remove(&channel.key).is_some()
        };
        if changed {
            self.publish(&held);
        }
        changed
    }

    pub fn remove_channel(&self, cid: &ChannelKey) -> bool {
        let mut held = self.channels.lock();
        let removed = held.remove(cid).is_some();
        if removed {
            self.publish(&held);
        }
        removed
    }

    pub fn contains(&self, cid: &ChannelKey) -> bool {
        self.channels.lock().contains_key(cid)
    }

    /// Current channel ids in sort order.
    pub fn cids(&self) -> Vec<ChannelKey> {
        self.cids.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ChannelKey>> {
        self.cids.subscribe()
    }

    fn admits(&self, channel: &Channel) -> bool {
        !channel.is_deleted() && self.filter.matches(channel)
    }

    fn publish(&self, held: &HashMap<ChannelKey, Channel>) {
        let mut sorted: Vec<&Channel> = held.values().collect();
        sorted.sort_by(|a, b| self.sort.compare(a, b));
        let cids: Vec<ChannelKey> = sorted.into_iter().map(|c| c.key.clone()).collect();
        self.cids.send_if_modified(|current| {
            if *current == cids {
                return false;
            }
            *current = cids;
            true
        });
    }
}

impl Coordinator for QueryChannelsLogic {
    fn teardown(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            debug!(filter = ?self.filter, "Query coordinator torn down");
        }
    }

    fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
