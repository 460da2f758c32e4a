use std::{hash::Hash, sync::Arc};

use dashmap::DashMap;

use crate::entry::Entry;

/// Concurrent key → entry map used for lookups without scanning buckets.
pub(crate) struct KeyIndex<K, V> {
    map: DashMap<K, Arc<Entry<K, V>>>,
}

impl<K, V> KeyIndex<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }

    /// Point `key` at `entry`, shadowing any older entry with the same key.
    pub(crate) fn put(&self, key: K, entry: Arc<Entry<K, V>>) {
        self.map.insert(key, entry);
    }

    /// Run `f` on the entry for `key` while the shard read lock is held.
    pub(crate) fn get<R>(&self, key: &K, f: impl FnOnce(&Entry<K, V>) -> R) -> Option<R> {
        self.map.get(key).map(|entry| f(&entry))
    }

    /// Another handle to the entry for `key`.
    #[cfg(test)]
    pub(crate) fn entry(&self, key: &K) -> Option<Arc<Entry<K, V>>> {
        self.map.get(key).map(|entry| Arc::clone(&entry))
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Unlink `entry` from the index, unless `key` has since been pointed
    /// at a newer entry.
    pub(crate) fn remove(&self, key: &K, entry: &Arc<Entry<K, V>>) -> bool {
        self.map
            .remove_if(key, |_, current| Arc::ptr_eq(current, entry))
            .is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
