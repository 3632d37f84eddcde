//! Bounded LRU cache.
//!
//! Uses `IndexMap` ordering as the recency list: the front is the least
//! recently used entry, the back the most recent. Touching an entry moves it
//! to the back; inserting into a full cache evicts the front.

use indexmap::IndexMap;
use std::hash::Hash;

pub struct LruCache<K, V> {
    map: IndexMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            map: IndexMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let (k, v) = self.map.shift_remove_entry(key)?;
        self.map.insert(k, v);
        self.map.last().map(|(_, v)| v)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace `key`, marking it most recently used.
    ///
    /// Returns the evicted least-recently-used entry when a new key is added
    /// to a full cache. Replacing an existing key never evicts.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.map.shift_remove(&key).is_some() {
            self.map.insert(key, value);
            return None;
        }
        let evicted = if self.map.len() >= self.capacity {
            self.map.shift_remove_index(0)
        } else {
            None
        };
        self.map.insert(key, value);
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.map.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::new(2);
        assert!(cache.insert("a", 1).is_none());
        assert!(cache.insert("b", 2).is_none());
        assert_eq!(cache.insert("c", 3), Some(("a", 1)));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains_key(&"a"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.insert("c", 3), Some(("b", 2)));
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.peek(&"a"), Some(&1));
        assert_eq!(cache.insert("c", 3), Some(("a", 1)));
    }

    #[test]
    fn test_replace_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(cache.insert("a", 10).is_none());
        assert_eq!(cache.peek(&"a"), Some(&10));
        // "b" is now the oldest.
        assert_eq!(cache.insert("c", 3), Some(("b", 2)));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("a", 1);
        assert_eq!(cache.insert("b", 2), Some(("a", 1)));
    }
}
