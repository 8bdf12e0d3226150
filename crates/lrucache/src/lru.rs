//! LRU (Least Recently Used) cache implementation
//!
//! Entries live in a slot arena and the recency list is threaded through the
//! slots by index, so relinking an entry never moves its key or value.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::num::NonZeroUsize;

use ahash::RandomState;

use crate::error::{Error, Result};

/// Most slots reserved up front; larger caches grow as entries arrive
const PREALLOC_LIMIT: usize = 1024;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// LRU cache with fixed capacity
///
/// The cache owns every key and value it holds. Lookups hand out shared
/// borrows tied to the cache, so a stored value cannot be changed behind the
/// cache's back or held across a later call.
///
/// The cache is not synchronized. Wrap it in a mutex to share it between
/// threads.
pub struct LruCache<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU cache with the given capacity
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries, at least 1
    ///
    /// # Returns
    /// * `Result<LruCache>` - Empty cache, or `Error::InvalidArgument` when
    ///   `capacity` is zero, negative or does not fit in `usize`
    pub fn new<C>(capacity: C) -> Result<Self>
    where
        C: TryInto<usize> + fmt::Display + Copy,
    {
        let requested: Option<usize> = capacity.try_into().ok();

        match requested.and_then(NonZeroUsize::new) {
            Some(capacity) => Ok(Self::with_capacity(capacity)),
            None => Err(Error::InvalidArgument(format!(
                "cache capacity must be at least 1, got {}",
                capacity
            ))),
        }
    }

    /// Create a new LRU cache whose capacity is already known to be valid
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        let reserve = capacity.min(PREALLOC_LIMIT);

        Self {
            map: HashMap::with_capacity_and_hasher(reserve, RandomState::new()),
            nodes: Vec::with_capacity(reserve),
            head: None,
            tail: None,
            free_list: Vec::new(),
            capacity,
        }
    }

    /// Get a value from the cache, marking it most recently used
    ///
    /// Returns `Error::KeyNotFound` on a miss and leaves the cache untouched.
    pub fn get<Q>(&mut self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key).ok_or(Error::KeyNotFound)?;
        self.move_to_front(idx);
        self.nodes[idx]
            .as_ref()
            .map(|node| &node.value)
            .ok_or(Error::KeyNotFound)
    }

    /// Get a value without changing its recency
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &idx = self.map.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Check whether a key is resident without changing its recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Insert a key-value pair into the cache
    ///
    /// An existing key keeps its entry and gets the new value. A new key
    /// evicts the least recently used entry first when the cache is full.
    /// Either way the key ends up most recently used.
    pub fn put(&mut self, key: K, value: V) {
        self.push(key, value);
    }

    /// Insert a key-value pair, returning whatever left the cache
    ///
    /// # Returns
    /// * `Some((key, old_value))` - the key was resident and its value replaced
    /// * `Some((lru_key, lru_value))` - a new key evicted the LRU entry
    /// * `None` - a new key fit without eviction
    pub fn push(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            let old = self.nodes[idx]
                .as_mut()
                .map(|node| mem::replace(&mut node.value, value));
            self.move_to_front(idx);
            return old.map(|old| (key, old));
        }

        // Evict before linking so the cache never holds capacity + 1 entries
        let evicted = if self.map.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.attach_front(idx);
        self.map.insert(key, idx);

        evicted
    }

    /// Remove a key from the cache
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &idx = self.map.get(key)?;
        self.detach(idx).map(|(_, value)| value)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        self.detach(idx)
    }

    fn detach(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.map.remove(&node.key);
        self.free_node(idx);
        Some((node.key, node.value))
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.free_list.push(idx);
    }
}

impl<K, V> LruCache<K, V> {
    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Get the fixed capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the cache, keeping its capacity
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    /// The entry that the next eviction would remove
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        let idx = self.tail?;
        self.nodes[idx].as_ref().map(|node| (&node.key, &node.value))
    }

    /// Iterate from most to least recently used without touching recency
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            next: self.head,
            remaining: self.map.len(),
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return; // Already at front
        }

        self.unlink(idx);
        self.attach_front(idx);
    }

    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;

        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(head_idx) => {
                if let Some(head) = &mut self.nodes[head_idx] {
                    head.prev = Some(idx);
                }
            }
            None => {
                self.tail = Some(idx);
            }
        }

        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &mut self.nodes[idx] {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a LruCache<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over cache entries, most recently used first
pub struct Iter<'a, K, V> {
    nodes: &'a [Option<Node<K, V>>],
    next: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let node = self.nodes[idx].as_ref()?;
        self.next = node.next;
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

#[cfg(test)]
impl<K: Hash + Eq + Clone + fmt::Debug, V> LruCache<K, V> {
    /// Walk the list and cross-check it against the index and free list
    fn check_invariants(&self) {
        assert!(self.map.len() <= self.capacity);
        assert!(self.nodes.len() <= self.capacity);
        assert_eq!(self.nodes.len(), self.map.len() + self.free_list.len());

        let mut prev = None;
        let mut cursor = self.head;
        let mut seen = 0;
        while let Some(idx) = cursor {
            let node = self.nodes[idx].as_ref().expect("linked slot is empty");
            assert_eq!(node.prev, prev, "broken prev link at slot {}", idx);
            assert_eq!(self.map.get(&node.key), Some(&idx), "{:?} not indexed", node.key);
            prev = Some(idx);
            cursor = node.next;
            seen += 1;
            assert!(seen <= self.map.len(), "cycle in recency list");
        }
        assert_eq!(seen, self.map.len());
        assert_eq!(self.tail, prev);

        for &idx in &self.free_list {
            assert!(self.nodes[idx].is_none(), "free slot {} still occupied", idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys<K: Clone, V>(cache: &LruCache<K, V>) -> Vec<K> {
        cache.iter().map(|(k, _)| k.clone()).collect()
    }

    #[test]
    fn test_lru_basic() {
        let mut cache = LruCache::new(2).unwrap();

        cache.put(1, "a");
        cache.put(2, "b");

        assert_eq!(cache.get(&1), Ok(&"a"));
        assert_eq!(cache.get(&2), Ok(&"b"));
        assert_eq!(cache.len(), 2);
        cache.check_invariants();
    }

    #[test]
    fn test_new_rejects_non_positive_capacity() {
        assert!(matches!(
            LruCache::<String, i32>::new(0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            LruCache::<String, i32>::new(-1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            LruCache::<String, i32>::new(i64::MIN),
            Err(Error::InvalidArgument(_))
        ));

        let cache = LruCache::<String, i32>::new(1).unwrap();
        assert_eq!(cache.capacity(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_new_accepts_huge_capacity() {
        let mut cache = LruCache::<u64, u64>::new(usize::MAX).unwrap();
        assert_eq!(cache.capacity(), usize::MAX);
        cache.put(1, 10);
        cache.put(2, 20);
        assert_eq!(cache.get(&1), Ok(&10));
        assert_eq!(cache.len(), 2);
        cache.check_invariants();

        let mut cache = LruCache::<String, String>::new(i64::MAX).unwrap();
        assert_eq!(cache.capacity(), i64::MAX as usize);
        cache.put("k".to_string(), "v".to_string());
        assert_eq!(cache.get("k").map(String::as_str), Ok("v"));
    }

    #[test]
    fn test_capacity_above_prealloc_limit() {
        let capacity = PREALLOC_LIMIT * 3;
        let mut cache = LruCache::new(capacity).unwrap();

        for k in 0..=capacity {
            cache.put(k, k);
        }

        assert_eq!(cache.len(), capacity);
        assert_eq!(cache.get(&0), Err(Error::KeyNotFound));
        assert_eq!(cache.get(&1), Ok(&1));
        assert_eq!(cache.get(&capacity), Ok(&capacity));
        cache.check_invariants();
    }

    #[test]
    fn test_invalid_capacity_message() {
        let err = LruCache::<u32, u32>::new(-1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument: cache capacity must be at least 1, got -1"
        );
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = LruCache::new(1usize).unwrap();

        cache.put("a", 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Ok(&1));

        cache.put("b", 2); // Evicts a
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Err(Error::KeyNotFound));
        assert_eq!(cache.get("b"), Ok(&2));
        cache.check_invariants();
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = LruCache::new(2).unwrap();

        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c"); // Should evict 1

        assert_eq!(cache.get(&1), Err(Error::KeyNotFound));
        assert_eq!(cache.get(&2), Ok(&"b"));
        assert_eq!(cache.get(&3), Ok(&"c"));
        cache.check_invariants();
    }

    #[test]
    fn test_eviction_removes_only_first_key() {
        let capacity = 5;
        let mut cache = LruCache::new(capacity).unwrap();

        for k in 0..=capacity {
            cache.put(k, k * 10);
            assert!(cache.len() <= capacity as usize);
        }

        assert_eq!(cache.get(&0), Err(Error::KeyNotFound));
        for k in 1..=capacity {
            assert_eq!(cache.get(&k), Ok(&(k * 10)));
        }
    }

    #[test]
    fn test_lru_update() {
        let mut cache = LruCache::new(2).unwrap();

        cache.put(1, "a");
        cache.put(2, "b");
        cache.get(&1).unwrap(); // Move 1 to front
        cache.put(3, "c"); // Should evict 2

        assert_eq!(cache.get(&1), Ok(&"a"));
        assert_eq!(cache.get(&2), Err(Error::KeyNotFound));
        assert_eq!(cache.get(&3), Ok(&"c"));
    }

    #[test]
    fn test_scenario_get_protects_key() {
        let mut cache = LruCache::new(3).unwrap();

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        cache.get("a").unwrap();
        cache.put("d", 4);

        assert_eq!(cache.get("b"), Err(Error::KeyNotFound));
        assert_eq!(cache.get("a"), Ok(&1));
        assert_eq!(cache.get("c"), Ok(&3));
        assert_eq!(cache.get("d"), Ok(&4));
    }

    #[test]
    fn test_scenario_put_protects_key() {
        let mut cache = LruCache::new(2).unwrap();

        cache.put("x", 1);
        cache.put("y", 2);
        cache.put("x", 9);
        cache.put("z", 3);

        assert_eq!(cache.get("y"), Err(Error::KeyNotFound));
        assert_eq!(cache.get("x"), Ok(&9));
        assert_eq!(cache.get("z"), Ok(&3));
    }

    #[test]
    fn test_lru_overwrite() {
        let mut cache = LruCache::new(2).unwrap();

        cache.put(1, "a");
        cache.put(1, "b"); // Overwrite

        assert_eq!(cache.get(&1), Ok(&"b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_miss_leaves_order_untouched() {
        let mut cache = LruCache::new(3).unwrap();

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        let before = keys(&cache);

        assert_eq!(cache.get("nope"), Err(Error::KeyNotFound));
        assert_eq!(keys(&cache), before);
        assert_eq!(cache.len(), 3);

        // a is still the eviction candidate
        cache.put("d", 4);
        assert_eq!(cache.get("a"), Err(Error::KeyNotFound));
        assert_eq!(cache.get("b"), Ok(&2));
    }

    #[test]
    fn test_string_keys_borrowed_lookup() {
        let mut cache: LruCache<String, Vec<u8>> = LruCache::new(2).unwrap();

        cache.put("key1".to_string(), b"value1".to_vec());
        assert_eq!(cache.get("key1").map(|v| v.as_slice()), Ok(&b"value1"[..]));
        assert!(cache.contains("key1"));
        assert_eq!(cache.peek("missing"), None);
    }

    #[test]
    fn test_get_does_not_move_value() {
        let mut cache = LruCache::new(3).unwrap();

        cache.put("a", String::from("alpha"));
        cache.put("b", String::from("beta"));
        let before = cache.peek("a").unwrap().as_ptr();

        cache.get("a").unwrap();
        cache.put("c", String::from("gamma"));
        cache.get("b").unwrap();

        assert_eq!(cache.get("a").unwrap().as_ptr(), before);
    }

    #[test]
    fn test_push_reports_replaced_and_evicted() {
        let mut cache = LruCache::new(2).unwrap();

        assert_eq!(cache.push("a", 1), None);
        assert_eq!(cache.push("b", 2), None);
        assert_eq!(cache.push("a", 10), Some(("a", 1)));
        assert_eq!(cache.push("c", 3), Some(("b", 2)));
        assert_eq!(keys(&cache), vec!["c", "a"]);
    }

    #[test]
    fn test_peek_and_contains_keep_recency() {
        let mut cache = LruCache::new(2).unwrap();

        cache.put(1, "a");
        cache.put(2, "b");

        assert_eq!(cache.peek(&1), Some(&"a"));
        assert!(cache.contains(&1));
        assert_eq!(cache.peek_lru(), Some((&1, &"a")));

        cache.put(3, "c"); // 1 was only peeked, so it goes
        assert!(!cache.contains(&1));
    }

    #[test]
    fn test_lru_remove() {
        let mut cache = LruCache::new(3).unwrap();

        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");

        assert_eq!(cache.remove(&2), Some("b"));
        assert_eq!(cache.remove(&2), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), Err(Error::KeyNotFound));
        cache.check_invariants();

        // Freed slot is reused
        cache.put(4, "d");
        cache.put(5, "e");
        assert_eq!(cache.len(), 3);
        assert_eq!(keys(&cache), vec![5, 4, 3]);
        cache.check_invariants();
    }

    #[test]
    fn test_pop_lru() {
        let mut cache = LruCache::new(3).unwrap();

        cache.put(1, "a");
        cache.put(2, "b");
        cache.get(&1).unwrap();

        assert_eq!(cache.pop_lru(), Some((2, "b")));
        assert_eq!(cache.pop_lru(), Some((1, "a")));
        assert_eq!(cache.pop_lru(), None);
        assert!(cache.is_empty());
        cache.check_invariants();
    }

    #[test]
    fn test_lru_clear() {
        let mut cache = LruCache::new(3).unwrap();

        cache.put(1, "a");
        cache.put(2, "b");
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 3);
        assert_eq!(cache.peek_lru(), None);

        cache.put(3, "c");
        assert_eq!(cache.get(&3), Ok(&"c"));
        cache.check_invariants();
    }

    #[test]
    fn test_iter_order_and_debug() {
        let mut cache = LruCache::new(3).unwrap();

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        cache.get("a").unwrap();

        let iter = cache.iter();
        assert_eq!(iter.len(), 3);
        assert_eq!(keys(&cache), vec!["a", "c", "b"]);
        assert_eq!(format!("{:?}", cache), r#"{"a": 1, "c": 3, "b": 2}"#);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, u16),
        Get(u8),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u8..16, any::<u16>()).prop_map(|(k, v)| Op::Put(k, v)),
            2 => (0u8..16).prop_map(Op::Get),
            1 => (0u8..16).prop_map(Op::Remove),
        ]
    }

    proptest! {
        /// len() never exceeds capacity.
        #[test]
        fn prop_len_within_capacity(
            capacity in 1usize..20,
            ops in prop::collection::vec((0u32..100, 0u32..100), 0..200)
        ) {
            let mut cache = LruCache::new(capacity).unwrap();
            for (key, value) in ops {
                cache.put(key, value);
                prop_assert!(cache.len() <= cache.capacity());
            }
        }

        /// Cache matches a vector kept in recency order after every operation.
        #[test]
        fn prop_matches_recency_model(
            capacity in 1usize..10,
            ops in prop::collection::vec(op_strategy(), 0..300)
        ) {
            let mut cache = LruCache::new(capacity).unwrap();
            // Most recently used first
            let mut model: Vec<(u8, u16)> = Vec::new();

            for op in ops {
                match op {
                    Op::Put(k, v) => {
                        model.retain(|&(mk, _)| mk != k);
                        if model.len() == capacity {
                            model.pop();
                        }
                        model.insert(0, (k, v));
                        cache.put(k, v);
                    }
                    Op::Get(k) => {
                        let expected = match model.iter().position(|&(mk, _)| mk == k) {
                            Some(pos) => {
                                let entry = model.remove(pos);
                                model.insert(0, entry);
                                Ok(entry.1)
                            }
                            None => Err(Error::KeyNotFound),
                        };
                        prop_assert_eq!(cache.get(&k).copied(), expected);
                    }
                    Op::Remove(k) => {
                        let expected = model
                            .iter()
                            .position(|&(mk, _)| mk == k)
                            .map(|pos| model.remove(pos).1);
                        prop_assert_eq!(cache.remove(&k), expected);
                    }
                }

                cache.check_invariants();
                let actual: Vec<(u8, u16)> = cache.iter().map(|(&k, &v)| (k, v)).collect();
                prop_assert_eq!(actual, model.clone());
            }
        }

        /// A touched key outlives every key touched before it.
        #[test]
        fn prop_touched_key_survives_refill(
            capacity in 2usize..12,
            touch in 0usize..12,
            by_get in any::<bool>()
        ) {
            let touch = touch % capacity;
            let mut cache = LruCache::new(capacity).unwrap();
            for k in 0..capacity {
                cache.put(k, k);
            }

            if by_get {
                cache.get(&touch).unwrap();
            } else {
                cache.put(touch, touch + 100);
            }

            // capacity - 1 new keys evict every untouched original key
            for k in capacity..(2 * capacity - 1) {
                cache.put(k, k);
            }

            prop_assert!(cache.contains(&touch));
            for k in (0..capacity).filter(|&k| k != touch) {
                prop_assert!(!cache.contains(&k));
            }
        }
    }
}
