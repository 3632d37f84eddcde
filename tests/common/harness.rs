#![allow(dead_code)]

use chatsync::SyncEngine;
use chatsync::config::Config;
use chatsync::proto::{Channel, ChannelKey, Message, SocketEvent, User, UserEvent};
use chatsync::repository::RepositoryFacade;
use chatsync::store::MemoryStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// A sync engine whose durable stores can be inspected.
pub struct TestEngine {
    pub engine: SyncEngine,
    pub users: Arc<MemoryStore<User>>,
    pub channels: Arc<MemoryStore<Channel>>,
    pub messages: Arc<MemoryStore<Message>>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let users = Arc::new(MemoryStore::<User>::new());
        let channels = Arc::new(MemoryStore::<Channel>::new());
        let messages = Arc::new(MemoryStore::<Message>::new());
        let repos = RepositoryFacade::new(
            &config.repository,
            users.clone(),
            channels.clone(),
            messages.clone(),
        );
        Self {
            engine: SyncEngine::new(config.client, Arc::new(repos)),
            users,
            channels,
            messages,
        }
    }

    /// Connect and confirm `user` on `connection_id`.
    pub async fn connect(&self, user: &User, connection_id: &str) {
        self.engine
            .on_user_event(UserEvent::ConnectUser(user.clone()))
            .await
            .expect("connect user");
        self.engine
            .on_socket_event(SocketEvent::ConnectionRequested)
            .await
            .expect("request connection");
        self.engine
            .on_socket_event(SocketEvent::Connected(connection_id.to_string()))
            .await
            .expect("connected");
        self.engine
            .on_user_event(UserEvent::UserConfirmed(user.clone()))
            .await
            .expect("confirm user");
    }
}

pub fn alice() -> User {
    User::new("alice", "Alice")
}

pub fn bob() -> User {
    User::new("bob", "Bob")
}

pub fn general() -> ChannelKey {
    ChannelKey::new("messaging", "general")
}

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
}

/// A top-level message in `general`, `secs` after a fixed epoch.
pub fn message(id: &str, user: &User, secs: i64) -> Message {
    Message::new(id, general(), user.id.clone(), id, epoch() + Duration::seconds(secs))
}
