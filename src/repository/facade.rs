//! Bundle of every repository the coordinators need.

use super::{ChannelRepository, FlushError, MessageRepository, Repository, UserRepository};
use crate::config::RepositoryConfig;
use crate::store::{self, DurableStore, MemoryStore, SqliteStore, StoreError};
use chatsync_proto::{Channel, Message, User};
use std::sync::Arc;
use tracing::info;

pub struct RepositoryFacade {
    pub users: UserRepository,
    pub channels: Arc<ChannelRepository>,
    pub messages: Arc<MessageRepository>,
}

impl RepositoryFacade {
    /// Build repositories over the given stores.
    pub fn new(
        config: &RepositoryConfig,
        users: Arc<dyn DurableStore<User>>,
        channels: Arc<dyn DurableStore<Channel>>,
        messages: Arc<dyn DurableStore<Message>>,
    ) -> Self {
        let delay = config.flush_delay();
        Self {
            users: UserRepository::new(users, config.user_cache_capacity, delay),
            channels: Repository::new("channels", channels, config.channel_cache_capacity, delay),
            messages: Repository::new("messages", messages, config.message_cache_capacity, delay),
        }
    }

    /// Repositories backed by in-process memory stores.
    pub fn in_memory(config: &RepositoryConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryStore::<User>::new()),
            Arc::new(MemoryStore::<Channel>::new()),
            Arc::new(MemoryStore::<Message>::new()),
        )
    }

    /// Repositories backed by SQLite tables at `path` (`:memory:` allowed).
    pub async fn sqlite(config: &RepositoryConfig, path: &str) -> Result<Self, StoreError> {
        let pool = store::sqlite::connect(path).await?;
        let users = SqliteStore::<User>::open(pool.clone(), "users").await?;
        let channels = SqliteStore::<Channel>::open(pool.clone(), "channels").await?;
        let messages = SqliteStore::<Message>::open(pool, "messages").await?;
        Ok(Self::new(
            config,
            Arc::new(users),
            Arc::new(channels),
            Arc::new(messages),
        ))
    }

    /// Flush every repository now. Every repository is attempted; the first
    /// failure is returned.
    pub async fn flush_all(&self) -> Result<usize, FlushError> {
        let results = [
            self.users.flush().await,
            self.channels.flush().await,
            self.messages.flush().await,
        ];
        let mut written = 0;
        let mut first_err = None;
        for result in results {
            match result {
                Ok(n) => written += n,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    /// Drop every cache and buffer and wipe all durable rows.
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.users.clear().await?;
        self.channels.clear().await?;
        self.messages.clear().await?;
        info!("Cleared all repositories");
        Ok(())
    }
}
