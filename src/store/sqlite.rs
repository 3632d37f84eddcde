//! SQLite durable store.
//!
//! Each entity kind gets its own two-column table: the `Display` form of the
//! key and the entity encoded as JSON. The schema is created on first use.

use super::{DurableStore, StoreError};
use async_trait::async_trait;
use chatsync_proto::Entity;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::fmt::Display;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Connection acquire timeout - prevents connection storms from blocking indefinitely.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum time a connection can remain idle before being closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Keys bound per `IN (...)` query; stays under SQLite's variable limit.
const SELECT_CHUNK: usize = 500;

/// Open a connection pool for `path`, or a private in-memory database for `:memory:`.
pub async fn connect(path: &str) -> Result<SqlitePool, StoreError> {
    let pool = if path == ":memory:" {
        // Uniquely named shared-cache memory database per call so parallel
        // tests never see each other's tables.
        let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let memdb_uri = format!(
            "file:chatsync-memdb-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            id
        );
        let options = SqliteConnectOptions::new()
            .filename(&memdb_uri)
            .shared_cache(true)
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(Some(IDLE_TIMEOUT))
            .connect_with(options)
            .await?
    } else {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(Some(IDLE_TIMEOUT))
            .connect_with(options)
            .await?;

        // WAL lets the flush writer run while readers hit the cache misses.
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        pool
    };

    info!(path = %path, "Database connected");
    Ok(pool)
}

/// Durable store for one entity kind backed by a SQLite table.
pub struct SqliteStore<V> {
    pool: SqlitePool,
    table: &'static str,
    _entity: PhantomData<fn() -> V>,
}

impl<V> SqliteStore<V> {
    /// Create the store, creating `table` if it does not exist.
    ///
    /// `table` must be a plain identifier; it is interpolated into SQL.
    pub async fn open(pool: SqlitePool, table: &'static str) -> Result<Self, StoreError> {
        debug_assert!(table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)"
        );
        sqlx::query(&ddl).execute(&pool).await?;
        Ok(Self {
            pool,
            table,
            _entity: PhantomData,
        })
    }

    pub fn table(&self) -> &'static str {
        self.table
    }
}

#[async_trait]
impl<V> DurableStore<V> for SqliteStore<V>
where
    V: Entity + Serialize + DeserializeOwned,
    V::Key: Display,
{
    async fn select_one(&self, key: &V::Key) -> Result<Option<V>, StoreError> {
        let sql = format!("SELECT value FROM {} WHERE key = ?", self.table);
        let row: Option<String> = sqlx::query_scalar(&sql)
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    async fn select_many(&self, keys: &[V::Key]) -> Result<Vec<V>, StoreError> {
        let mut found = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(SELECT_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT value FROM {} WHERE key IN ({placeholders})",
                self.table
            );
            let mut query = sqlx::query_scalar::<_, String>(&sql);
            for key in chunk {
                query = query.bind(key.to_string());
            }
            for json in query.fetch_all(&self.pool).await? {
                found.push(serde_json::from_str(&json)?);
            }
        }
        Ok(found)
    }

    async fn insert_one(&self, value: V) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)",
            self.table
        );
        let json = serde_json::to_string(&value)?;
        sqlx::query(&sql)
            .bind(value.key().to_string())
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_many(&self, values: Vec<V>) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)",
            self.table
        );
        let mut tx = self.pool.begin().await?;
        for value in &values {
            let json = serde_json::to_string(value)?;
            sqlx::query(&sql)
                .bind(value.key().to_string())
                .bind(json)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {}", self.table);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}
