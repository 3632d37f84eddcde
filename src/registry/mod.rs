//! Logic registry.
//!
//! Guarantees a single coordinator per key for each coordinator kind and
//! hands out shared `Arc`s to it. Lookups by content ("which channel shows
//! message X") scan the active coordinators; the active set is small.

mod dashmap_ext;
mod map;

pub use map::LogicMap;

use crate::logic::{ChannelLogic, GlobalState, QueryChannelsLogic, QueryKey, ThreadLogic};
use crate::repository::RepositoryFacade;
use chatsync_proto::{ChannelKey, MessageId, QueryFilter, QuerySort};
use std::sync::Arc;
use tracing::info;

/// Registry of every live coordinator.
pub struct LogicRegistry {
    repos: Arc<RepositoryFacade>,
    global: Arc<GlobalState>,
    message_limit: usize,
    channels: LogicMap<ChannelKey, ChannelLogic>,
    threads: LogicMap<MessageId, ThreadLogic>,
    queries: LogicMap<QueryKey, QueryChannelsLogic>,
}

impl LogicRegistry {
    pub fn new(repos: Arc<RepositoryFacade>, message_limit: usize) -> Self {
        Self {
            repos,
            global: Arc::new(GlobalState::new()),
            message_limit,
            channels: LogicMap::new("channel"),
            threads: LogicMap::new("thread"),
            queries: LogicMap::new("query_channels"),
        }
    }

    pub fn global(&self) -> &Arc<GlobalState> {
        &self.global
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// The coordinator for `cid`, created on first access.
    pub fn channel(&self, cid: &ChannelKey) -> Arc<ChannelLogic> {
        self.channels.resolve_with(cid.clone(), |cid| {
            ChannelLogic::new(
                cid.clone(),
                Arc::clone(&self.repos),
                Arc::clone(&self.global),
                self.message_limit,
            )
        })
    }

    pub fn channel_if_active(&self, cid: &ChannelKey) -> Option<Arc<ChannelLogic>> {
        self.channels.get(cid)
    }

    pub fn is_active_channel(&self, cid: &ChannelKey) -> bool {
        self.channels.contains(cid)
    }

    pub fn remove_channel(&self, cid: &ChannelKey) -> bool {
        self.channels.remove(cid).is_some()
    }

    pub fn active_channels(&self) -> Vec<Arc<ChannelLogic>> {
        self.channels.list_active()
    }

    /// The channel coordinator currently showing `message_id`.
    pub fn channel_from_message_id(&self, message_id: &str) -> Option<Arc<ChannelLogic>> {
        self.channels.find(|c| c.has_message(message_id))
    }

    // ========================================================================
    // Threads
    // ========================================================================

    /// The coordinator for the thread under `parent_id`, created on first access.
    pub fn thread(&self, parent_id: &str) -> Arc<ThreadLogic> {
        self.threads.resolve_with(parent_id.to_string(), |id| {
            ThreadLogic::new(id.clone(), Arc::clone(&self.repos))
        })
    }

    pub fn thread_if_active(&self, parent_id: &str) -> Option<Arc<ThreadLogic>> {
        self.threads.get(&parent_id.to_string())
    }

    /// The thread coordinator whose parent or replies include `message_id`.
    pub fn thread_from_message_id(&self, message_id: &str) -> Option<Arc<ThreadLogic>> {
        self.threads.find(|t| t.has_message(message_id))
    }

    pub fn remove_thread(&self, parent_id: &str) -> bool {
        self.threads.remove(&parent_id.to_string()).is_some()
    }

    pub fn active_threads(&self) -> Vec<Arc<ThreadLogic>> {
        self.threads.list_active()
    }

    // ========================================================================
    // Channel-list queries
    // ========================================================================

    /// The coordinator for `(filter, sort)`, created on first access.
    pub fn query_channels(&self, filter: QueryFilter, sort: QuerySort) -> Arc<QueryChannelsLogic> {
        self.queries
            .resolve_with((filter, sort), |key| QueryChannelsLogic::new(key.clone()))
    }

    pub fn remove_query_channels(&self, filter: QueryFilter, sort: QuerySort) -> bool {
        self.queries.remove(&(filter, sort)).is_some()
    }

    pub fn active_query_channels(&self) -> Vec<Arc<QueryChannelsLogic>> {
        self.queries.list_active()
    }

    /// Tear down every coordinator of every kind and reset global aggregates.
    pub fn clear(&self) {
        let channels = self.channels.clear();
        let threads = self.threads.clear();
        let queries = self.queries.clear();
        self.global.clear();
        info!(channels, threads, queries, "Logic registry cleared");
    }
}
