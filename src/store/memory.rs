//! In-memory durable store.
//!
//! Keeps rows in a map and counts every call so callers can assert exactly
//! which reads and writes reached "durable" storage. Writes can be made to
//! fail, and reads or writes can take a fixed amount of time.

use super::{DurableStore, StoreError};
use async_trait::async_trait;
use chatsync_proto::Entity;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct StoreStats {
    pub select_one: AtomicUsize,
    pub select_many: AtomicUsize,
    pub insert_one: AtomicUsize,
    pub insert_many: AtomicUsize,
    pub delete_all: AtomicUsize,
}

impl StoreStats {
    /// Number of calls that read from the store.
    pub fn reads(&self) -> usize {
        self.select_one.load(Ordering::SeqCst) + self.select_many.load(Ordering::SeqCst)
    }

    /// Number of calls that wrote to the store.
    pub fn writes(&self) -> usize {
        self.insert_one.load(Ordering::SeqCst) + self.insert_many.load(Ordering::SeqCst)
    }
}

pub struct MemoryStore<V: Entity> {
    rows: Mutex<HashMap<V::Key, V>>,
    batches: Mutex<Vec<Vec<V>>>,
    stats: StoreStats,
    fail_writes: AtomicBool,
    read_delay: Option<Duration>,
    write_delay: Option<Duration>,
}

impl<V: Entity> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Entity> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            batches: Mutex::new(Vec::new()),
            stats: StoreStats::default(),
            fail_writes: AtomicBool::new(false),
            read_delay: None,
            write_delay: None,
        }
    }

    /// Make every write sleep for `delay` before committing.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Make every read sleep for `delay` after taking its rows, so the
    /// result can be older than the store by the time it is returned.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Seed rows without touching the counters.
    pub fn seed(&self, values: impl IntoIterator<Item = V>) {
        let mut rows = self.rows.lock();
        for value in values {
            rows.insert(value.key(), value);
        }
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Every batch passed to `insert_many`, in call order.
    pub fn written_batches(&self) -> Vec<Vec<V>> {
        self.batches.lock().clone()
    }

    /// Current durable row for `key`, bypassing the counters.
    pub fn row(&self, key: &V::Key) -> Option<V> {
        self.rows.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    async fn before_read(&self) {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn before_write(&self) -> Result<(), StoreError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<V: Entity> DurableStore<V> for MemoryStore<V> {
    async fn select_one(&self, key: &V::Key) -> Result<Option<V>, StoreError> {
        self.stats.select_one.fetch_add(1, Ordering::SeqCst);
        let row = self.rows.lock().get(key).cloned();
        self.before_read().await;
        Ok(row)
    }

    async fn select_many(&self, keys: &[V::Key]) -> Result<Vec<V>, StoreError> {
        self.stats.select_many.fetch_add(1, Ordering::SeqCst);
        let found: Vec<V> = {
            let rows = self.rows.lock();
            keys.iter().filter_map(|k| rows.get(k).cloned()).collect()
        };
        self.before_read().await;
        Ok(found)
    }

    async fn insert_one(&self, value: V) -> Result<(), StoreError> {
        self.stats.insert_one.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.rows.lock().insert(value.key(), value);
        Ok(())
    }

    async fn insert_many(&self, values: Vec<V>) -> Result<(), StoreError> {
        self.stats.insert_many.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        {
            let mut rows = self.rows.lock();
            for value in &values {
                rows.insert(value.key(), value.clone());
            }
        }
        self.batches.lock().push(values);
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.stats.delete_all.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().clear();
        Ok(())
    }
}
