//! Bounded Access-Ordered Cache
//!
//! Fixed-capacity store that evicts the least-recently-used entry once an
//! insert pushes it over capacity. Reads and writes both count as use.
//!
//! # Design
//!
//! - Every access takes the next value of a monotonic tick, so recency is a
//!   total order with no ties
//! - `BTreeMap<tick, key>` keeps keys in recency order; the first entry is
//!   always the eviction victim
//! - One mutex guards structural changes; a read-then-write sequence by a
//!   caller is not serialized (see [`BoundedAccessCache::get_or_insert_with`])

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};

struct Slot<V> {
    value: V,
    tick: u64,
}

struct Inner<K, V> {
    map: HashMap<K, Slot<V>>,
    /// tick -> key, oldest first
    order: BTreeMap<u64, K>,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let tick = self.next_tick();
        let slot = self.map.get_mut(key)?;
        if let Some(owned) = self.order.remove(&slot.tick) {
            self.order.insert(tick, owned);
        }
        slot.tick = tick;
        Some(&slot.value)
    }
}

/// LRU cache with a fixed entry capacity
pub struct BoundedAccessCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    /// Hit count
    hits: AtomicU64,
    /// Miss count
    misses: AtomicU64,
    /// Eviction count
    evictions: AtomicU64,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedAccessCache<K, V> {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity {
                name: "bounded access cache".to_string(),
                capacity,
            });
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: BTreeMap::new(),
                tick: 0,
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Get a value and mark it most recently used
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let found = self.inner.lock().touch(key).cloned();
        match found {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("bounded cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }
        found
    }

    /// Get a value without changing recency
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().map.get(key).map(|slot| slot.value.clone())
    }

    /// Insert or replace a value, evicting the least recently used entry on
    /// overflow. Returns the replaced value.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let tick = inner.next_tick();

        if let Some(slot) = inner.map.get_mut(&key) {
            let old_tick = std::mem::replace(&mut slot.tick, tick);
            let old = std::mem::replace(&mut slot.value, value);
            inner.order.remove(&old_tick);
            inner.order.insert(tick, key);
            return Some(old);
        }

        inner.map.insert(key.clone(), Slot { value, tick });
        inner.order.insert(tick, key);

        if inner.map.len() > self.capacity {
            if let Some((_, oldest)) = inner.order.pop_first() {
                inner.map.remove(&oldest);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(capacity = self.capacity, "evicted least recently used entry");
            }
        }

        None
    }

    /// Return the cached value or compute and insert one
    ///
    /// `compute` runs outside the lock. Two callers missing on the same key
    /// may both compute; the later insert wins.
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.put(key, value.clone());
        value
    }

    /// Remove an entry
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.lock();
        let slot = inner.map.remove(key)?;
        inner.order.remove(&slot.tick);
        Some(slot.value)
    }

    /// Check if cache contains a key (does not change recency)
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.lock().map.contains_key(key)
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.inner.lock().order.values().cloned().collect()
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }
}

impl<K, V> BoundedAccessCache<K, V> {
    /// Get number of entries
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get eviction count
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> LruStats {
        LruStats {
            entries: self.len(),
            capacity: self.capacity,
            hits: self.hits(),
            misses: self.misses(),
            hit_ratio: self.hit_ratio(),
            evictions: self.evictions(),
        }
    }
}

impl<K, V> fmt::Debug for BoundedAccessCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedAccessCache")
            .field("entries", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Bounded cache statistics
#[derive(Debug, Clone)]
pub struct LruStats {
    /// Number of entries
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
    /// Eviction count
    pub evictions: u64,
}

// =============================================================================
// Tests
// =============================================================================
