//! A thread-safe, bounded LRU map.
//!
//! The recency list is a doubly linked list threaded through a `Vec` arena
//! instead of `std::list` + raw iterators, so the whole thing stays safe
//! Rust while keeping the O(1) get/store shape of the original
//! hash-map-plus-linked-list design.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<K, V> {
    capacity: usize,
    arena: Vec<Option<Node<K, V>>>,
    index: HashMap<K, usize>,
    head: Option<usize>, // most recent
    tail: Option<usize>, // least recent
    free: Vec<usize>,
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn new(capacity: usize) -> Self {
        Inner {
            capacity,
            arena: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
            free: Vec::new(),
        }
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.arena[slot].as_ref().expect("detach of live slot");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.arena[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.arena[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let node = self.arena[slot].as_mut().expect("push_front of live slot");
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.arena[h].as_mut().unwrap().prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn promote(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.detach(slot);
        self.push_front(slot);
    }

    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node { key, value, prev: None, next: None };
        if let Some(slot) = self.free.pop() {
            self.arena[slot] = Some(node);
            slot
        } else {
            self.arena.push(Some(node));
            self.arena.len() - 1
        }
    }

    fn evict_tail(&mut self) -> K {
        let slot = self.tail.expect("evict_tail called on non-empty cache");
        self.detach(slot);
        let node = self.arena[slot].take().expect("tail slot occupied");
        self.index.remove(&node.key);
        self.free.push(slot);
        node.key
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let slot = *self.index.get(key)?;
        self.promote(slot);
        Some(self.arena[slot].as_ref().unwrap().value.clone())
    }

    fn store(&mut self, key: K, value: V) -> (bool, Option<K>) {
        if let Some(&slot) = self.index.get(&key) {
            self.arena[slot].as_mut().unwrap().value = value;
            self.promote(slot);
            return (true, None);
        }

        let evicted = if self.index.len() >= self.capacity {
            Some(self.evict_tail())
        } else {
            None
        };

        let slot = self.alloc(key.clone(), value);
        self.index.insert(key, slot);
        self.push_front(slot);
        (false, evicted)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn keys_most_recent_first(&self) -> Vec<K> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let node = self.arena[slot].as_ref().unwrap();
            out.push(node.key.clone());
            cursor = node.next;
        }
        out
    }
}

/// A bounded, thread-safe LRU cache mapping `K` to `V`.
///
/// All operations take the single internal mutex for their full duration,
/// so lookup and promotion (or lookup, eviction, and insertion) are always
/// atomic with respect to one another.
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Builds an empty cache. Panics if `capacity` is zero — a zero-size
    /// LRU cache cannot hold the entry it would need to evict to make
    /// room for the next one.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "LruCache capacity must be at least 1");
        Inner::new(capacity).into()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key)
    }

    /// Stores `value` under `key`. See the module doc for the exact
    /// update/insert/evict contract encoded in the returned tuple.
    pub fn store(&self, key: K, value: V) -> (bool, Option<K>) {
        self.lock().store(key, value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in recency order, most-recently-used first. Diagnostic only.
    pub fn keys_most_recent_first(&self) -> Vec<K> {
        self.lock().keys_most_recent_first()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<K, V> From<Inner<K, V>> for LruCache<K, V> {
    fn from(inner: Inner<K, V>) -> Self {
        LruCache { inner: Mutex::new(inner) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_under_capacity_never_evicts() {
        let cache: LruCache<&str, i32> = LruCache::new(4);
        assert_eq!(cache.store("a", 1), (false, None));
        assert_eq!(cache.store("b", 2), (false, None));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn overwrite_existing_key_reports_updated() {
        let cache: LruCache<&str, i32> = LruCache::new(4);
        cache.store("a", 1);
        assert_eq!(cache.store("a", 2), (true, None));
        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn eviction_at_capacity_picks_least_recent() {
        let cache: LruCache<&str, i32> = LruCache::new(2);
        cache.store("a", 1);
        cache.store("b", 2);
        let (updated, evicted) = cache.store("c", 3);
        assert!(!updated);
        assert_eq!(evicted, Some("a"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&"a").is_none());
    }

    #[test]
    fn get_promotes_so_it_survives_the_next_eviction() {
        let cache: LruCache<&str, i32> = LruCache::new(2);
        cache.store("a", 1);
        cache.store("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        let (_, evicted) = cache.store("c", 3);
        assert_eq!(evicted, Some("b"));
        assert!(cache.get(&"a").is_some());
    }

    #[test]
    fn index_and_recency_list_stay_consistent() {
        let cache: LruCache<i32, i32> = LruCache::new(3);
        for i in 0..10 {
            cache.store(i, i * 10);
        }
        assert_eq!(cache.len(), 3);
        let keys = cache.keys_most_recent_first();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], 9);
    }

    #[test]
    fn most_recent_first_reflects_promotion_order() {
        let cache: LruCache<&str, i32> = LruCache::new(3);
        cache.store("a", 1);
        cache.store("b", 2);
        cache.store("c", 3);
        cache.get(&"a");
        assert_eq!(cache.keys_most_recent_first(), vec!["a", "c", "b"]);
    }
}
