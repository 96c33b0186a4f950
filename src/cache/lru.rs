//! Charge-accounted LRU cache.
//!
//! A sharded LRU cache whose capacity is expressed in bytes; every entry
//! carries an explicit charge and eviction runs from the cold end until
//! total usage fits.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Statistics for cache operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: AtomicU64,
    /// Number of cache misses.
    pub misses: AtomicU64,
    /// Number of insertions.
    pub inserts: AtomicU64,
    /// Number of evictions.
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Create new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// A node in the LRU linked list.
struct LruNode<K, V> {
    key: K,
    value: V,
    charge: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A single shard of the LRU cache.
struct LruShard<K, V> {
    /// Byte capacity of this shard.
    capacity: usize,
    /// Total charge of resident entries.
    usage: usize,
    /// Map from key to node index.
    map: HashMap<K, usize>,
    /// Node storage (using indices instead of pointers).
    nodes: Vec<Option<LruNode<K, V>>>,
    /// Free list of node indices.
    free_list: Vec<usize>,
    /// Head of LRU list (most recently used).
    head: Option<usize>,
    /// Tail of LRU list (least recently used).
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone, V: Clone> LruShard<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            usage: 0,
            map: HashMap::new(),
            nodes: Vec::new(),
            free_list: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        if let Some(&idx) = self.map.get(key) {
            self.move_to_front(idx);
            self.nodes[idx].as_ref().map(|n| n.value.clone())
        } else {
            None
        }
    }

    /// Insert or update an entry. Returns the number of evictions.
    fn insert(&mut self, key: K, value: V, charge: usize) -> usize {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = self.nodes[idx].as_mut() {
                self.usage = self.usage - node.charge + charge;
                node.value = value;
                node.charge = charge;
            }
            self.move_to_front(idx);
            return self.evict_to_capacity();
        }

        let idx = self.allocate_node();
        self.nodes[idx] = Some(LruNode {
            key: key.clone(),
            value,
            charge,
            prev: None,
            next: self.head,
        });
        self.usage += charge;

        if let Some(head_idx) = self.head {
            if let Some(head_node) = self.nodes[head_idx].as_mut() {
                head_node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }

        self.map.insert(key, idx);
        self.evict_to_capacity()
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        if let Some(idx) = self.map.remove(key) {
            let value = self.unlink_node(idx);
            self.free_list.push(idx);
            value
        } else {
            None
        }
    }

    /// Evict cold entries until usage fits the capacity.
    ///
    /// A lone over-sized entry is allowed to stay; the most recently
    /// inserted entry is never evicted by its own insertion.
    fn evict_to_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.usage > self.capacity && self.map.len() > 1 {
            self.evict_lru();
            evicted += 1;
        }
        evicted
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn allocate_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node must exist");
            (node.prev, node.next)
        };

        if let Some(prev_idx) = prev {
            if let Some(prev_node) = self.nodes[prev_idx].as_mut() {
                prev_node.next = next;
            }
        }
        if let Some(next_idx) = next {
            if let Some(next_node) = self.nodes[next_idx].as_mut() {
                next_node.prev = prev;
            }
        }
        if self.tail == Some(idx) {
            self.tail = prev;
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = self.head;
        }
        if let Some(head_idx) = self.head {
            if let Some(head_node) = self.nodes[head_idx].as_mut() {
                head_node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
    }

    fn evict_lru(&mut self) {
        if let Some(tail_idx) = self.tail {
            let key = self.nodes[tail_idx]
                .as_ref()
                .expect("tail node must exist")
                .key
                .clone();
            self.map.remove(&key);
            self.unlink_node(tail_idx);
            self.free_list.push(tail_idx);
        }
    }

    fn unlink_node(&mut self, idx: usize) -> Option<V> {
        let (prev, next, value, charge) = {
            let node = self.nodes[idx].take()?;
            (node.prev, node.next, node.value, node.charge)
        };
        self.usage -= charge;

        if let Some(prev_idx) = prev {
            if let Some(prev_node) = self.nodes[prev_idx].as_mut() {
                prev_node.next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_idx) = next {
            if let Some(next_node) = self.nodes[next_idx].as_mut() {
                next_node.prev = prev;
            }
        } else {
            self.tail = prev;
        }

        Some(value)
    }
}

/// Number of shards for the cache.
const NUM_SHARDS: usize = 16;

/// A sharded, charge-accounted LRU cache for concurrent access.
///
/// The byte capacity is divided among the shards; each shard has its own
/// LRU list and lock.
pub struct LruCache<K, V> {
    shards: Vec<Mutex<LruShard<K, V>>>,
    stats: Arc<CacheStats>,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// Create a new cache with the given capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        let shard_capacity = capacity.div_ceil(NUM_SHARDS);
        let shards = (0..NUM_SHARDS)
            .map(|_| Mutex::new(LruShard::new(shard_capacity)))
            .collect();

        Self {
            shards,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Get a value from the cache.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut shard = self.shards[self.shard_index(key)].lock();
        let result = shard.get(key);

        if result.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }

        result
    }

    /// Insert a value with the given charge.
    ///
    /// Returns true if any entry was evicted to make room.
    pub fn insert(&self, key: K, value: V, charge: usize) -> bool {
        let evicted = {
            let mut shard = self.shards[self.shard_index(&key)].lock();
            shard.insert(key, value, charge)
        };

        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        if evicted > 0 {
            self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        evicted > 0
    }

    /// Remove a value from the cache.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut shard = self.shards[self.shard_index(key)].lock();
        shard.remove(key)
    }

    /// Get the total number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total charge of resident entries across all shards.
    pub fn usage(&self) -> usize {
        self.shards.iter().map(|s| s.lock().usage).sum()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    fn shard_index(&self, key: &K) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() as usize % NUM_SHARDS
    }
}
