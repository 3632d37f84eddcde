//! Pending-write buffer.
//!
//! Collects values written since the last flush together with the single
//! "flush scheduled" flag. Both live under the repository lock, so checking
//! the flag and appending a value happen atomically.

use chatsync_proto::Entity;
use std::collections::HashSet;

pub struct PendingWrites<V: Entity> {
    items: Vec<V>,
    flush_scheduled: bool,
}

impl<V: Entity> Default for PendingWrites<V> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            flush_scheduled: false,
        }
    }
}

impl<V: Entity> PendingWrites<V> {
    pub fn push(&mut self, value: V) {
        self.items.push(value);
    }

    /// Mark a flush as scheduled. Returns `true` if the caller must start the
    /// timer, `false` if one is already pending for this batch.
    pub fn mark_scheduled(&mut self) -> bool {
        !std::mem::replace(&mut self.flush_scheduled, true)
    }

    /// Forget the scheduled flag without taking the batch.
    pub fn unschedule(&mut self) {
        self.flush_scheduled = false;
    }

    pub fn is_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    /// Most recent buffered value for `key`.
    pub fn latest(&self, key: &V::Key) -> Option<&V> {
        self.items.iter().rev().find(|v| v.key() == *key)
    }

    /// Swap the buffer for an empty one and deduplicate by key.
    ///
    /// The last write for each key wins and keeps its position relative to
    /// the other survivors. Writes arriving after this call land in the next
    /// batch.
    pub fn take_batch(&mut self) -> Vec<V> {
        self.flush_scheduled = false;
        let items = std::mem::take(&mut self.items);
        let mut seen = HashSet::with_capacity(items.len());
        let mut batch: Vec<V> = items
            .into_iter()
            .rev()
            .filter(|v| seen.insert(v.key()))
            .collect();
        batch.reverse();
        batch
    }

    /// Buffered values in write order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_proto::User;

    #[test]
    fn test_take_batch_last_write_wins() {
        let mut pending = PendingWrites::default();
        pending.push(User::new("a", "v1"));
        pending.push(User::new("b", "B"));
        pending.push(User::new("a", "v2"));

        let batch = pending.take_batch();
        assert_eq!(batch, vec![User::new("b", "B"), User::new("a", "v2")]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_schedule_once_per_batch() {
        let mut pending: PendingWrites<User> = PendingWrites::default();
        assert!(pending.mark_scheduled());
        assert!(!pending.mark_scheduled());
        pending.take_batch();
        assert!(!pending.is_scheduled());
        assert!(pending.mark_scheduled());
    }

    #[test]
    fn test_latest_prefers_newest() {
        let mut pending = PendingWrites::default();
        pending.push(User::new("a", "v1"));
        pending.push(User::new("a", "v2"));
        assert_eq!(pending.latest(&"a".to_string()).map(|u| u.name.as_str()), Some("v2"));
        assert!(pending.latest(&"b".to_string()).is_none());
    }
}
