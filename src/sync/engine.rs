use super::event::ChatEvent;
use super::reconnect::{mark_channels_stale, reconcile_stale_channels};
use crate::config::{ClientConfig, Config};
use crate::error::ClientResult;
use crate::logic::{ChannelLogic, QueryChannelsLogic};
use crate::registry::LogicRegistry;
use crate::repository::RepositoryFacade;
use crate::state::{ClientState, Committed};
use crate::telemetry::spans;
use chatsync_proto::{
    Channel, ChannelKey, Message, QueryFilter, QuerySort, SocketEvent, SocketState, User,
    UserEvent, UserState,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

/// Ties the connection state, repositories and coordinators together.
///
/// Collaborators are passed in explicitly; there is no process-wide client.
pub struct SyncEngine {
    config: ClientConfig,
    state: ClientState,
    repos: Arc<RepositoryFacade>,
    registry: LogicRegistry,
}

impl SyncEngine {
    pub fn new(config: ClientConfig, repos: Arc<RepositoryFacade>) -> Self {
        let registry = LogicRegistry::new(Arc::clone(&repos), config.message_limit);
        Self {
            config,
            state: ClientState::new(),
            repos,
            registry,
        }
    }

    /// Build stores from configuration: SQLite when `[database]` is set,
    /// memory otherwise.
    pub async fn from_config(config: &Config) -> ClientResult<Self> {
        let repos = match &config.database {
            Some(db) => RepositoryFacade::sqlite(&config.repository, &db.path).await?,
            None => RepositoryFacade::in_memory(&config.repository),
        };
        Ok(Self::new(config.client.clone(), Arc::new(repos)))
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn repos(&self) -> &Arc<RepositoryFacade> {
        &self.repos
    }

    pub fn registry(&self) -> &LogicRegistry {
        &self.registry
    }

    // ========================================================================
    // Connection events
    // ========================================================================

    /// Apply a transport event.
    ///
    /// Leaving `Connected` marks watched channels stale; entering it again
    /// reloads them.
    pub async fn on_socket_event(&self, event: SocketEvent) -> ClientResult<SocketState> {
        let Committed { previous, current } = self.state.on_socket_event(event)?;
        match (&previous, &current) {
            (SocketState::Connected { .. }, SocketState::Connected { connection_id }) => {
                debug!(connection_id = %connection_id, "Connection id replaced");
            }
            (_, SocketState::Connected { connection_id }) => {
                info!(connection_id = %connection_id, "Connection established");
                if self.config.reconcile_on_reconnect {
                    reconcile_stale_channels(self.registry.active_channels())
                        .instrument(spans::connection(connection_id))
                        .await;
                }
            }
            (SocketState::Connected { connection_id }, _) => {
                let stale = mark_channels_stale(&self.registry.active_channels());
                warn!(connection_id = %connection_id, state = ?current, stale, "Connection lost");
            }
            _ => {}
        }
        Ok(current)
    }

    /// Apply an identity event.
    ///
    /// A confirmed identity becomes the repositories' current user. Logout
    /// tears down every coordinator and, unless configured otherwise, wipes
    /// the repositories.
    pub async fn on_user_event(&self, event: UserEvent) -> ClientResult<UserState> {
        let logout = matches!(event, UserEvent::Logout);
        let Committed { previous, current } = self.state.on_user_event(event)?;
        match &current {
            UserState::UserSet(user) | UserState::AnonymousSet(user) => {
                info!(user_id = %user.id, anonymous = current.is_anonymous(), "User set");
                self.repos.users.insert_current_user(user.clone());
            }
            UserState::NotSet if logout => {
                if let Some(user) = previous.user() {
                    info!(user_id = %user.id, "User logged out");
                }
                self.registry.clear();
                self.repos.users.forget_current_user();
                if self.config.clear_on_logout {
                    self.repos.clear_all().await?;
                }
            }
            UserState::NotSet => {
                warn!(previous = ?previous, "Setting user failed");
            }
            _ => {}
        }
        Ok(current)
    }

    // ========================================================================
    // Chat events
    // ========================================================================

    /// Route a backend event to the repositories and the live coordinators.
    pub async fn on_chat_event(&self, event: ChatEvent) -> ClientResult<()> {
        let kind = event.kind();
        debug!(kind, "Chat event");
        match event {
            ChatEvent::MessageNew(message) => {
                let span = spans::chat_event(kind, Some(&message.cid.to_string()));
                self.on_message_new(message).instrument(span).await?;
            }
            ChatEvent::MessageUpdated(message) => self.on_message_updated(message),
            ChatEvent::MessageDeleted(message) => self.on_message_deleted(message),
            ChatEvent::ChannelUpdated(channel) => self.on_channel_updated(channel),
            ChatEvent::ChannelDeleted(cid) => self.on_channel_deleted(&cid).await?,
            ChatEvent::UserUpdated(user) => self.on_user_updated(user)?,
        }
        Ok(())
    }

    async fn on_message_new(&self, message: Message) -> ClientResult<()> {
        self.repos.messages.put(message.clone());

        if let Some(parent_id) = message.parent_id.as_deref() {
            if let Some(thread) = self.registry.thread_if_active(parent_id) {
                thread.upsert_reply(message);
            }
            return Ok(());
        }

        if let Some(channel) = self.repos.channels.update_last_message(&message).await? {
            self.propagate_channel(channel);
        }
        if let Some(logic) = self.registry.channel_if_active(&message.cid) {
            logic.upsert_message(message);
        }
        Ok(())
    }

    fn on_message_updated(&self, message: Message) {
        self.repos.messages.put(message.clone());
        if let Some(channel) = self.registry.channel_from_message_id(&message.id) {
            channel.upsert_message(message.clone());
        }
        if let Some(thread) = self.registry.thread_from_message_id(&message.id) {
            if thread.parent_id() == message.id {
                thread.update_parent(message);
            } else {
                thread.upsert_reply(message);
            }
        }
    }

    fn on_message_deleted(&self, message: Message) {
        self.repos.messages.put(message.clone());
        if let Some(channel) = self.registry.channel_from_message_id(&message.id) {
            channel.delete_message(&message.id);
        }
        if let Some(thread) = self.registry.thread_from_message_id(&message.id) {
            if thread.parent_id() == message.id {
                self.registry.remove_thread(&message.id);
            } else {
                thread.delete_reply(&message.id);
            }
        }
    }

    fn on_channel_updated(&self, channel: Channel) {
        self.repos.channels.put(channel.clone());
        self.propagate_channel(channel);
    }

    /// Replace the channel with a tombstone so neither the buffered write nor
    /// the durable row brings it back.
    async fn on_channel_deleted(&self, cid: &ChannelKey) -> ClientResult<()> {
        if let Some(channel) = self.repos.channels.get(cid).await?
            && !channel.is_deleted()
        {
            self.repos.channels.put(channel.deleted(Utc::now()));
        }
        self.registry.remove_channel(cid);
        for query in self.registry.active_query_channels() {
            query.remove_channel(cid);
        }
        for thread in self.registry.active_threads() {
            if thread.state().parent.is_some_and(|p| p.cid == *cid) {
                self.registry.remove_thread(thread.parent_id());
            }
        }
        info!(cid = %cid, "Channel deleted");
        Ok(())
    }

    fn on_user_updated(&self, user: User) -> ClientResult<()> {
        self.repos.users.put(user.clone());
        let is_current = self
            .repos
            .users
            .current_user_id()
            .is_some_and(|id| id == user.id);
        if is_current && self.state.user_state().user().is_some() {
            self.state.on_user_event(UserEvent::UserUpdated(user))?;
        }
        Ok(())
    }

    fn propagate_channel(&self, channel: Channel) {
        for query in self.registry.active_query_channels() {
            query.on_channel_updated(channel.clone());
        }
        if let Some(logic) = self.registry.channel_if_active(&channel.key) {
            logic.update_channel(channel);
        }
    }

    // ========================================================================
    // Coordinators
    // ========================================================================

    /// Resolve the channel coordinator and load it.
    pub async fn watch_channel(&self, cid: &ChannelKey) -> ClientResult<Arc<ChannelLogic>> {
        let channel = self.registry.channel(cid);
        channel
            .watch()
            .instrument(spans::channel(&cid.to_string()))
            .await?;
        Ok(channel)
    }

    /// Stop watching a channel and tear its coordinator down.
    pub fn stop_watching(&self, cid: &ChannelKey) -> bool {
        self.registry.remove_channel(cid)
    }

    /// Resolve a channel-list query and seed it with every resident channel
    /// it matches.
    pub fn query_channels(&self, filter: QueryFilter, sort: QuerySort) -> Arc<QueryChannelsLogic> {
        let query = self.registry.query_channels(filter, sort);
        let live: Vec<Channel> = self
            .repos
            .channels
            .resident()
            .into_iter()
            .filter(|c| !c.is_deleted())
            .collect();
        query.add_channels(live);
        query
    }

    /// Tear down coordinators and flush every repository.
    ///
    /// Returns the number of values written by the final flush.
    pub async fn shutdown(&self) -> ClientResult<usize> {
        self.registry.clear();
        let flushed = self.repos.flush_all().await?;
        info!(flushed, "Sync engine shut down");
        Ok(flushed)
    }
}
