//! Durable store abstraction.
//!
//! The sync core treats persistence as an opaque key-value table per entity
//! kind. Any backend that can select, insert and wipe entities by key is
//! acceptable; two are provided:
//!
//! - [`MemoryStore`]: in-process map with call counters, used by tests and
//!   when no database is configured
//! - [`SqliteStore`]: SQLite via `sqlx`, one JSON document per row

use async_trait::async_trait;
use chatsync_proto::Entity;
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, StoreStats};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Durable storage for one entity kind.
#[async_trait]
pub trait DurableStore<V: Entity>: Send + Sync {
    /// Read one entity by key.
    async fn select_one(&self, key: &V::Key) -> Result<Option<V>, StoreError>;

    /// Read every existing entity among `keys`. Missing keys are skipped.
    async fn select_many(&self, keys: &[V::Key]) -> Result<Vec<V>, StoreError>;

    /// Insert or replace one entity.
    async fn insert_one(&self, value: V) -> Result<(), StoreError>;

    /// Insert or replace a batch of entities in one call.
    async fn insert_many(&self, values: Vec<V>) -> Result<(), StoreError>;

    /// Delete every entity of this kind.
    async fn delete_all(&self) -> Result<(), StoreError>;
}
