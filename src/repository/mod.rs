//! Entity repositories.
//!
//! A [`Repository`] fronts one [`DurableStore`] with a bounded LRU cache and
//! a batching write buffer:
//!
//! - reads prefer memory; a miss consults the pending buffer, then the store
//! - writes update the cache synchronously and are buffered for a deferred
//!   flush; values equal to the cached copy are dropped before the buffer
//! - the first buffered write of a batch starts a timer; when it fires the
//!   buffer is swapped out, deduplicated (last write wins) and written with a
//!   single `insert_many`
//!
//! At most one durable write is in flight per repository (the flush gate).
//! A failed background flush is logged and broadcast on the error channel;
//! the batch is dropped and the cache is left ahead of the store.

mod buffer;
mod cache;
mod channels;
mod facade;
mod messages;
mod users;

pub use buffer::PendingWrites;
pub use cache::LruCache;
pub use channels::ChannelRepository;
pub use facade::RepositoryFacade;
pub use messages::MessageRepository;
pub use users::UserRepository;

use crate::store::{DurableStore, StoreError};
use chatsync_proto::Entity;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, error, warn};

/// Capacity of the flush error broadcast channel.
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Latest cached values, republished after every structural change.
pub type Snapshot<V> = Arc<HashMap<<V as Entity>::Key, V>>;

/// A flush failed and its batch was dropped.
#[derive(Debug, Clone, Error)]
#[error("{repository}: flush of {lost} values failed: {message}")]
pub struct FlushError {
    pub repository: &'static str,
    /// Number of values in the dropped batch.
    pub lost: usize,
    pub message: String,
}

struct Inner<V: Entity> {
    cache: LruCache<V::Key, V>,
    pending: PendingWrites<V>,
    /// Bumped by `clear`; store reads started under an older generation
    /// must not repopulate the cache.
    generation: u64,
}

/// Cache-plus-buffer repository for one entity kind.
///
/// Always constructed behind an `Arc`: the flush timer keeps the repository
/// alive until its batch has been written.
pub struct Repository<V: Entity> {
    name: &'static str,
    store: Arc<dyn DurableStore<V>>,
    inner: Mutex<Inner<V>>,
    /// Held for the duration of every durable write and of `clear`.
    flush_gate: tokio::sync::Mutex<()>,
    flush_delay: Duration,
    snapshot: watch::Sender<Snapshot<V>>,
    errors: broadcast::Sender<FlushError>,
    this: Weak<Self>,
}

impl<V: Entity> Repository<V> {
    pub fn new(
        name: &'static str,
        store: Arc<dyn DurableStore<V>>,
        capacity: usize,
        flush_delay: Duration,
    ) -> Arc<Self> {
        let (snapshot, _) = watch::channel(Arc::new(HashMap::new()));
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Arc::new_cyclic(|this| Self {
            name,
            store,
            inner: Mutex::new(Inner {
                cache: LruCache::new(capacity),
                pending: PendingWrites::default(),
                generation: 0,
            }),
            flush_gate: tokio::sync::Mutex::new(()),
            flush_delay,
            snapshot,
            errors,
            this: this.clone(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get one entity, reading through to the store on a cache miss.
    pub async fn get(&self, key: &V::Key) -> Result<Option<V>, StoreError> {
        let generation = {
            let mut inner = self.inner.lock();
            if let Some(value) = inner.cache.get(key) {
                return Ok(Some(value.clone()));
            }
            if let Some(value) = inner.pending.latest(key).cloned() {
                inner.cache.insert(key.clone(), value.clone());
                return Ok(Some(value));
            }
            inner.generation
        };

        debug!(repository = self.name, ?key, "Cache miss, reading store");
        let loaded = self.store.select_one(key).await?;
        Ok(loaded.map(|value| self.fill_from_store(value, generation)))
    }

    /// Get every existing entity among `keys`, batch-reading only the misses.
    ///
    /// Each existing key appears once in the result; order is unspecified.
    pub async fn get_many(&self, keys: &[V::Key]) -> Result<Vec<V>, StoreError> {
        let mut found = Vec::with_capacity(keys.len());
        let mut misses = Vec::new();
        let generation = {
            let mut inner = self.inner.lock();
            let mut seen = HashSet::with_capacity(keys.len());
            for key in keys {
                if !seen.insert(key) {
                    continue;
                }
                if let Some(value) = inner.cache.get(key) {
                    found.push(value.clone());
                } else if let Some(value) = inner.pending.latest(key).cloned() {
                    inner.cache.insert(key.clone(), value.clone());
                    found.push(value);
                } else {
                    misses.push(key.clone());
                }
            }
            inner.generation
        };

        if !misses.is_empty() {
            debug!(repository = self.name, misses = misses.len(), "Batch cache miss, reading store");
            let loaded = self.store.select_many(&misses).await?;
            found.extend(loaded.into_iter().map(|v| self.fill_from_store(v, generation)));
        }
        Ok(found)
    }

    /// Cached value for `key`, without touching recency or the store.
    pub fn peek(&self, key: &V::Key) -> Option<V> {
        let inner = self.inner.lock();
        inner
            .cache
            .peek(key)
            .or_else(|| inner.pending.latest(key))
            .cloned()
    }

    /// Every value currently resident in memory (cache plus pending buffer).
    pub fn resident(&self) -> Vec<V> {
        let inner = self.inner.lock();
        let mut out: HashMap<V::Key, V> = inner
            .cache
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for value in inner.pending.iter() {
            out.entry(value.key()).or_insert_with(|| value.clone());
        }
        out.into_values().collect()
    }

    /// Insert a value read from the store unless a newer one is already in
    /// memory or the repository was cleared while the read was in flight.
    fn fill_from_store(&self, value: V, generation: u64) -> V {
        let key = value.key();
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(repository = self.name, ?key, "Repository cleared during read, not caching");
            return value;
        }
        if let Some(newer) = inner.cache.peek(&key) {
            return newer.clone();
        }
        if let Some(newer) = inner.pending.latest(&key).cloned() {
            inner.cache.insert(key, newer.clone());
            return newer;
        }
        inner.cache.insert(key, value.clone());
        value
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write one value. Visible to `get` immediately; durable after the next flush.
    pub fn put(&self, value: V) {
        self.put_many(vec![value]);
    }

    /// Write a batch of values. Values equal to the cached copy are dropped.
    pub fn put_many(&self, values: Vec<V>) {
        let schedule = {
            let mut inner = self.inner.lock();
            let mut changed = 0usize;
            for value in values {
                let key = value.key();
                if inner.cache.peek(&key) == Some(&value) {
                    continue;
                }
                inner.cache.insert(key, value.clone());
                inner.pending.push(value);
                changed += 1;
            }
            if changed == 0 {
                return;
            }
            self.publish(&inner);
            inner.pending.mark_scheduled()
        };

        if schedule {
            self.schedule_flush();
        }
    }

    /// Number of buffered, not yet durable values.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn cached_len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    // ========================================================================
    // Flush
    // ========================================================================

    fn schedule_flush(&self) {
        let Some(repo) = self.this.upgrade() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                repository = self.name,
                "No async runtime; pending writes wait for an explicit flush"
            );
            self.inner.lock().pending.unschedule();
            return;
        };

        let delay = self.flush_delay;
        let span = crate::telemetry::spans::flush(self.name);
        handle.spawn(
            async move {
                tokio::time::sleep(delay).await;
                repo.flush_in_background().await;
            }
            .instrument(span),
        );
    }

    async fn flush_in_background(&self) {
        if let Err(err) = self.flush().await {
            let _ = self.errors.send(err);
        }
    }

    /// Write the pending batch now.
    ///
    /// Returns the number of values written. On failure the batch is dropped,
    /// the error is logged and returned; the cache is not rolled back.
    pub async fn flush(&self) -> Result<usize, FlushError> {
        let _gate = self.flush_gate.lock().await;
        let batch = self.inner.lock().pending.take_batch();
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        match self.store.insert_many(batch).await {
            Ok(()) => {
                debug!(repository = self.name, count, "Flushed pending writes");
                Ok(count)
            }
            Err(e) => {
                error!(repository = self.name, lost = count, error = %e, "Flush failed, batch dropped");
                Err(FlushError {
                    repository: self.name,
                    lost: count,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Drop the cache and pending buffer and delete every durable row.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _gate = self.flush_gate.lock().await;
        {
            let mut inner = self.inner.lock();
            inner.generation = inner.generation.wrapping_add(1);
            inner.cache.clear();
            inner.pending.clear();
            self.publish(&inner);
        }
        let deleted = self.store.delete_all().await;
        // Reads that started before the rows were gone may have seen them.
        let mut inner = self.inner.lock();
        inner.generation = inner.generation.wrapping_add(1);
        deleted
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Subscribe to the latest-values snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<V>> {
        {
            let inner = self.inner.lock();
            self.snapshot.send_replace(Arc::new(inner.snapshot()));
        }
        self.snapshot.subscribe()
    }

    /// Subscribe to background flush failures.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<FlushError> {
        self.errors.subscribe()
    }

    fn publish(&self, inner: &Inner<V>) {
        if self.snapshot.receiver_count() > 0 {
            self.snapshot.send_replace(Arc::new(inner.snapshot()));
        }
    }
}

impl<V: Entity> Inner<V> {
    fn snapshot(&self) -> HashMap<V::Key, V> {
        self.cache
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chatsync_proto::User;
    use std::sync::atomic::Ordering;

    const DELAY: Duration = Duration::from_secs(1);

    fn repo_with(store: &Arc<MemoryStore<User>>, capacity: usize) -> Arc<Repository<User>> {
        Repository::new("users", store.clone(), capacity, DELAY)
    }

    fn key(id: &str) -> String {
        id.to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_visible_without_store_read() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);

        repo.put(User::new("a", "A"));
        assert_eq!(repo.get(&key("a")).await.unwrap(), Some(User::new("a", "A")));
        assert_eq!(store.stats().reads(), 0);
        assert_eq!(store.stats().writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_put_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);

        repo.put(User::new("a", "A"));
        repo.put(User::new("a", "A"));
        assert_eq!(repo.pending_len(), 1);

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(store.written_batches(), vec![vec![User::new("a", "A")]]);

        // Still equal to the cached copy after the flush: nothing new is written.
        repo.put(User::new("a", "A"));
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(store.stats().insert_many.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_batch() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);

        repo.put(User::new("a", "v1"));
        repo.put(User::new("b", "B"));
        repo.put(User::new("a", "v2"));
        repo.put_many(vec![User::new("c", "C"), User::new("a", "v3")]);

        tokio::time::sleep(DELAY / 2).await;
        assert_eq!(store.stats().writes(), 0);

        tokio::time::sleep(DELAY * 2).await;
        let batches = store.written_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![User::new("b", "B"), User::new("c", "C"), User::new("a", "v3")]
        );
        assert_eq!(repo.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trickle_flushes_periodically() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);

        repo.put(User::new("a", "A"));
        tokio::time::sleep(DELAY * 9 / 10).await;
        repo.put(User::new("b", "B"));
        tokio::time::sleep(DELAY / 5).await;
        // Timer started by the first write fired; "b" rode along.
        assert_eq!(store.written_batches().len(), 1);
        assert_eq!(store.written_batches()[0].len(), 2);

        repo.put(User::new("c", "C"));
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(store.written_batches().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_during_flush_joins_next_batch() {
        let store = Arc::new(MemoryStore::new().with_write_delay(Duration::from_millis(500)));
        let repo = repo_with(&store, 10);

        repo.put(User::new("a", "A"));
        // Timer fires at 1s; the store write is in flight until 1.5s.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        repo.put(User::new("b", "B"));
        assert_eq!(repo.pending_len(), 1);

        tokio::time::sleep(DELAY * 3).await;
        assert_eq!(
            store.written_batches(),
            vec![vec![User::new("a", "A")], vec![User::new("b", "B")]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_forces_store_read() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 2);

        repo.put(User::new("a", "A"));
        repo.put(User::new("b", "B"));
        repo.flush().await.unwrap();
        repo.put(User::new("c", "C"));
        assert_eq!(repo.cached_len(), 2);

        assert_eq!(repo.get(&key("b")).await.unwrap().map(|u| u.name), Some("B".into()));
        assert_eq!(store.stats().reads(), 0);

        assert_eq!(repo.get(&key("a")).await.unwrap().map(|u| u.name), Some("A".into()));
        assert_eq!(store.stats().select_one.load(Ordering::SeqCst), 1);

        // Now resident again.
        repo.get(&key("a")).await.unwrap();
        assert_eq!(store.stats().select_one.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_many_reads_only_misses() {
        let store = Arc::new(MemoryStore::new());
        store.seed([User::new("b", "B"), User::new("c", "C")]);
        let repo = repo_with(&store, 10);
        repo.put(User::new("a", "A"));

        let mut users = repo
            .get_many(&[key("a"), key("b"), key("c"), key("d"), key("a")])
            .await
            .unwrap();
        users.sort_by(|x, y| x.id.cmp(&y.id));
        let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.stats().select_many.load(Ordering::SeqCst), 1);

        repo.get_many(&[key("b"), key("c")]).await.unwrap();
        assert_eq!(store.stats().select_many.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_value_served_after_eviction() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 1);

        repo.put(User::new("a", "A"));
        repo.put(User::new("b", "B"));
        assert_eq!(repo.get(&key("a")).await.unwrap().map(|u| u.name), Some("A".into()));
        assert_eq!(store.stats().reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_keeps_cache() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);
        store.set_fail_writes(true);

        repo.put(User::new("a", "A"));
        let err = repo.flush().await.unwrap_err();
        assert_eq!(err.lost, 1);
        assert_eq!(err.repository, "users");

        assert_eq!(repo.get(&key("a")).await.unwrap(), Some(User::new("a", "A")));
        assert!(store.is_empty());
        assert_eq!(repo.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_failure_is_broadcast() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);
        let mut errors = repo.subscribe_errors();
        store.set_fail_writes(true);

        repo.put(User::new("a", "A"));
        tokio::time::sleep(DELAY * 2).await;

        let err = errors.try_recv().unwrap();
        assert_eq!(err.lost, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_wipes_everything() {
        let store = Arc::new(MemoryStore::new());
        store.seed([User::new("old", "Old")]);
        let repo = repo_with(&store, 10);
        repo.put(User::new("a", "A"));

        repo.clear().await.unwrap();
        assert_eq!(repo.cached_len(), 0);
        assert_eq!(repo.pending_len(), 0);
        assert!(store.is_empty());

        tokio::time::sleep(DELAY * 2).await;
        assert!(store.written_batches().is_empty());
        assert_eq!(repo.get(&key("a")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_store_read_does_not_restore_row() {
        let store = Arc::new(MemoryStore::new().with_read_delay(Duration::from_millis(100)));
        store.seed([User::new("a", "stale")]);
        let repo = repo_with(&store, 10);

        let reader = tokio::spawn({
            let repo = Arc::clone(&repo);
            async move { repo.get(&key("a")).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.stats().select_one.load(Ordering::SeqCst), 1);

        repo.clear().await.unwrap();
        reader.await.unwrap().unwrap();

        assert_eq!(repo.cached_len(), 0);
        assert_eq!(repo.peek(&key("a")), None);
        assert_eq!(repo.get(&key("a")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_batch_read_does_not_restore_rows() {
        let store = Arc::new(MemoryStore::new().with_read_delay(Duration::from_millis(100)));
        store.seed([User::new("a", "stale"), User::new("b", "stale")]);
        let repo = repo_with(&store, 10);

        let reader = tokio::spawn({
            let repo = Arc::clone(&repo);
            async move { repo.get_many(&[key("a"), key("b")]).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        repo.clear().await.unwrap();
        reader.await.unwrap().unwrap();
        assert_eq!(repo.cached_len(), 0);
        assert!(repo.resident().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_tracks_puts() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);
        let rx = repo.subscribe();
        assert!(rx.borrow().is_empty());

        repo.put(User::new("a", "A"));
        repo.put(User::new("b", "B"));
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a"), Some(&User::new("a", "A")));
    }

    #[test]
    fn test_put_without_runtime_waits_for_explicit_flush() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(&store, 10);
        repo.put(User::new("a", "A"));
        assert_eq!(repo.pending_len(), 1);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        assert_eq!(rt.block_on(repo.flush()).unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
