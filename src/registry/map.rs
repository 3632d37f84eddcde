//! Concurrent coordinator map.

use super::dashmap_ext::DashMapExt;
use crate::logic::Coordinator;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// One coordinator per key, created lazily.
///
/// [`resolve_with`](Self::resolve_with) is an atomic compute-if-absent: the
/// constructor runs under the key's shard lock, so racing callers for an
/// unseen key all observe the single instance it builds. Constructors must
/// not touch the same map.
pub struct LogicMap<K, C> {
    kind: &'static str,
    entries: DashMap<K, Arc<C>>,
}

impl<K, C> LogicMap<K, C>
where
    K: Eq + Hash + Clone + Debug,
    C: Coordinator,
{
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Existing coordinator for `key`, or the one `create` builds.
    pub fn resolve_with<F>(&self, key: K, create: F) -> Arc<C>
    where
        F: FnOnce(&K) -> Arc<C>,
    {
        if let Some(existing) = self.entries.get_cloned(&key) {
            return existing;
        }
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let created = create(entry.key());
                debug!(kind = self.kind, key = ?entry.key(), "Coordinator created");
                entry.insert(Arc::clone(&created));
                created
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<C>> {
        self.entries.get_cloned(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Detach and tear down the coordinator for `key`.
    pub fn remove(&self, key: &K) -> Option<Arc<C>> {
        let (key, coordinator) = self.entries.remove(key)?;
        coordinator.teardown();
        debug!(kind = self.kind, ?key, "Coordinator removed");
        Some(coordinator)
    }

    /// Point-in-time snapshot of every live coordinator.
    pub fn list_active(&self) -> Vec<Arc<C>> {
        self.entries.values_cloned()
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// First live coordinator matching `pred`.
    pub fn find(&self, pred: impl FnMut(&C) -> bool) -> Option<Arc<C>> {
        self.entries.find_cloned(pred)
    }

    /// Remove and tear down every coordinator. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let keys = self.keys();
        keys.iter().filter(|k| self.remove(k).is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
