//! Bounded LRU map shared by the object, container, and profile caches.

use indexmap::IndexMap;
use std::hash::Hash;

/// Insertion-ordered map where a `get` refreshes recency and an insert
/// past capacity evicts the least recently used entry. Eviction is
/// transparent to callers: a later lookup misses and reloads from the
/// backing source.
#[derive(Debug)]
pub(crate) struct LruMap<K, V> {
    capacity: usize,
    map: IndexMap<K, V>,
}

impl<K: Hash + Eq, V: Clone> LruMap<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Fetch a value and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        if self.capacity == 0 {
            return None;
        }
        let index = self.map.get_index_of(key)?;
        let value = self.map.get_index(index)?.1.clone();
        if index + 1 != self.map.len() {
            self.map.move_index(index, self.map.len() - 1);
        }
        Some(value)
    }

    /// Insert at the most-recent slot, evicting the oldest entry when
    /// over capacity.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if self.map.contains_key(&key) {
            self.map.shift_remove(&key);
        }
        self.map.insert(key, value);
        if self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.map.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
