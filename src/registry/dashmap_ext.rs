use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Snapshot helpers for maps of shared coordinators.
///
/// `DashMap` guards hold a shard lock. Callers of these helpers get owned
/// `Arc`s back, so no guard outlives the call and a coordinator can be used
/// across `.await` without blocking other keys in the same shard.
pub trait DashMapExt<K, C: ?Sized> {
    /// Clone the coordinator for `key`.
    fn get_cloned(&self, key: &K) -> Option<Arc<C>>;

    /// Point-in-time copy of every coordinator.
    fn values_cloned(&self) -> Vec<Arc<C>>;

    /// First coordinator matching `pred`, by linear scan.
    fn find_cloned(&self, pred: impl FnMut(&C) -> bool) -> Option<Arc<C>>;
}

impl<K, C> DashMapExt<K, C> for DashMap<K, Arc<C>>
where
    K: Eq + Hash,
    C: ?Sized,
{
    fn get_cloned(&self, key: &K) -> Option<Arc<C>> {
        self.get(key).map(|r| Arc::clone(r.value()))
    }

    fn values_cloned(&self) -> Vec<Arc<C>> {
        self.iter().map(|e| Arc::clone(e.value())).collect()
    }

    fn find_cloned(&self, mut pred: impl FnMut(&C) -> bool) -> Option<Arc<C>> {
        // Collect first so `pred` never runs under a shard lock.
        self.values_cloned().into_iter().find(|c| pred(c.as_ref()))
    }
}
