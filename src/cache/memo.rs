//! Keyed Memoizing Cache
//!
//! Computes a value at most once per composite key, no matter how many
//! callers race on first access.
//!
//! # Design
//!
//! - Lookups go straight to a [`DashMap`]; no per-key lock on a hit
//! - On a miss the caller takes the lock for that key only, re-checks, and
//!   then runs the factory, so callers on other keys proceed in parallel
//! - Values are published as `Arc<V>` after they are fully built
//! - Factory errors propagate to the caller and are never stored
//!
//! A factory must not call back into the same cache for the same key; doing
//! so panics instead of deadlocking.

use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use super::key::{CacheKey, KeyPart};
use super::locks::KeyLocks;

thread_local! {
    /// (cache address, key) pairs whose factory is running on this thread
    static IN_FLIGHT: RefCell<Vec<(usize, CacheKey)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a key as being computed on the current thread
struct InFlight {
    cache: usize,
}

impl InFlight {
    fn enter(cache: usize, key: &CacheKey) -> Self {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(c, k)| *c == cache && k == key) {
                drop(stack);
                panic!("re-entrant KeyedMemoCache access for key `{}` from its own factory", key);
            }
            stack.push((cache, key.clone()));
        });
        Self { cache }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|(c, _)| *c == self.cache) {
                stack.remove(pos);
            }
        });
    }
}

/// Memoizing cache over composite keys
///
/// `P` is the key part type (use `dyn KeyPart` for mixed parts), `V` the
/// cached value and `E` the factory's error type.
pub struct KeyedMemoCache<P: ?Sized, V, E = Infallible> {
    /// Published values
    entries: DashMap<CacheKey, Arc<V>>,
    /// Per-key locks for first computation
    locks: KeyLocks<CacheKey>,
    /// Builds a value from key parts
    factory: Box<dyn Fn(&[&P]) -> Result<V, E> + Send + Sync>,
    /// Hit count
    hits: AtomicU64,
    /// Miss count
    misses: AtomicU64,
    /// Factory invocations
    computations: AtomicU64,
}

impl<P, V, E> KeyedMemoCache<P, V, E>
where
    P: KeyPart + ?Sized,
{
    /// Create a cache around a fallible factory
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&[&P]) -> Result<V, E> + Send + Sync + 'static,
    {
        Self {
            entries: DashMap::new(),
            locks: KeyLocks::new(),
            factory: Box::new(factory),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    /// Get the value for `parts`
    ///
    /// An existing entry is always returned. Without one, `do_cache = true`
    /// computes and stores it (once per key), while `do_cache = false`
    /// returns a freshly computed value that is not stored.
    pub fn get(&self, do_cache: bool, parts: &[&P]) -> Result<Arc<V>, E> {
        let key = CacheKey::from_parts(parts);

        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        if !do_cache {
            let _in_flight = InFlight::enter(self.address(), &key);
            trace!(key = %key, "computing uncached value");
            return self.compute(parts).map(Arc::new);
        }

        let _in_flight = InFlight::enter(self.address(), &key);
        let _guard = self.locks.lock(key.clone());

        // Double-check under the key lock
        if let Some(value) = self.entries.get(&key) {
            return Ok(Arc::clone(value.value()));
        }

        debug!(key = %key, "computing cached value");
        let value = Arc::new(self.compute(parts)?);
        self.entries.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Compute and store a value unconditionally, returning the one replaced
    pub fn create(&self, parts: &[&P]) -> Result<Option<Arc<V>>, E> {
        let key = CacheKey::from_parts(parts);
        let _in_flight = InFlight::enter(self.address(), &key);
        let _guard = self.locks.lock(key.clone());

        debug!(key = %key, "refreshing cached value");
        let value = Arc::new(self.compute(parts)?);
        Ok(self.entries.insert(key, value))
    }

    /// Check if a value is stored for `parts`
    pub fn contains(&self, parts: &[&P]) -> bool {
        self.entries.contains_key(&CacheKey::from_parts(parts))
    }

    /// Drop the value stored for `parts`
    pub fn remove(&self, parts: &[&P]) -> Option<Arc<V>> {
        self.entries
            .remove(&CacheKey::from_parts(parts))
            .map(|(_, value)| value)
    }

    /// Drop every stored value
    ///
    /// Shards are emptied one after another; a computation finishing while
    /// this runs may still publish its value.
    pub fn clear(&self) {
        self.entries.clear();
        debug!("memo cache cleared");
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get factory invocation count
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> MemoStats {
        MemoStats {
            entries: self.len(),
            hits: self.hits(),
            misses: self.misses(),
            computations: self.computations(),
            live_locks: self.locks.len(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<V>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "memo cache hit");
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn compute(&self, parts: &[&P]) -> Result<V, E> {
        self.computations.fetch_add(1, Ordering::Relaxed);
        (self.factory)(parts)
    }

    fn address(&self) -> usize {
        self as *const Self as *const () as usize
    }
}

impl<P, V> KeyedMemoCache<P, V, Infallible>
where
    P: KeyPart + ?Sized,
{
    /// Create a cache around an infallible factory
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn(&[&P]) -> V + Send + Sync + 'static,
    {
        Self::new(move |parts: &[&P]| Ok(factory(parts)))
    }

    /// Get or compute-and-store the value for `parts`
    pub fn get_or_create(&self, parts: &[&P]) -> Arc<V> {
        match self.get(true, parts) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<P: ?Sized, V, E> fmt::Debug for KeyedMemoCache<P, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedMemoCache")
            .field("entries", &self.entries.len())
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

/// Memo cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoStats {
    /// Stored values
    pub entries: usize,
    /// Lookups answered from the store
    pub hits: u64,
    /// Lookups that found nothing stored
    pub misses: u64,
    /// Factory invocations, including failed and uncached ones
    pub computations: u64,
    /// Keys currently holding a computation lock
    pub live_locks: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    use once_cell::sync::OnceCell;

    struct Token;

    fn token_cache() -> KeyedMemoCache<str, Token> {
        KeyedMemoCache::from_fn(|_: &[&str]| Token)
    }

    #[test]
    fn test_same_key_returns_same_instance() {
        let cache = token_cache();
        let first = cache.get_or_create(&["key"]);
        let second = cache.get_or_create(&["key"]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn test_distinct_keys_return_distinct_instances() {
        let cache = token_cache();
        let first = cache.get_or_create(&["key"]);
        let second = cache.get_or_create(&["key2"]);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_multi_part_key() {
        let cache = token_cache();
        let first = cache.get_or_create(&["key", "key1"]);
        let second = cache.get_or_create(&["key", "key1"]);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_empty_and_absent_keys_are_cached() {
        let cache: KeyedMemoCache<Option<String>, Token> =
            KeyedMemoCache::from_fn(|_: &[&Option<String>]| Token);

        let empty1 = cache.get_or_create(&[]);
        let empty2 = cache.get_or_create(&[]);
        assert!(Arc::ptr_eq(&empty1, &empty2));

        let absent1 = cache.get_or_create(&[&None]);
        let absent2 = cache.get_or_create(&[&None]);
        assert!(Arc::ptr_eq(&absent1, &absent2));
        assert!(!Arc::ptr_eq(&empty1, &absent1));
    }

    #[test]
    fn test_factory_receives_parts() {
        let cache: KeyedMemoCache<str, String> =
            KeyedMemoCache::from_fn(|parts: &[&str]| parts.join("+"));
        assert_eq!(*cache.get_or_create(&["a", "b"]), "a+b");
    }

    #[test]
    fn test_bypass_without_entry_is_fresh_each_time() {
        let cache = token_cache();
        let first = cache.get(false, &["key"]).unwrap();
        let second = cache.get(false, &["key"]).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_bypass_with_entry_returns_cached() {
        let cache = token_cache();
        let cached = cache.get(true, &["key"]).unwrap();
        let bypassed = cache.get(false, &["key"]).unwrap();
        assert!(Arc::ptr_eq(&cached, &bypassed));
        assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn test_clear_forces_recompute() {
        let cache = token_cache();
        let before = cache.get_or_create(&["key"]);
        cache.clear();
        assert!(cache.is_empty());
        let after = cache.get_or_create(&["key"]);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_create_replaces_and_returns_previous() {
        let cache = token_cache();
        assert!(cache.create(&["key"]).unwrap().is_none());
        let current = cache.get_or_create(&["key"]);

        let replaced = cache.create(&["key"]).unwrap().unwrap();
        assert!(Arc::ptr_eq(&current, &replaced));

        let refreshed = cache.get_or_create(&["key"]);
        assert!(!Arc::ptr_eq(&current, &refreshed));
    }

    #[test]
    fn test_factory_error_is_not_cached_and_lock_released() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let cache: KeyedMemoCache<str, u32, String> = KeyedMemoCache::new(move |_: &[&str]| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("first attempt fails".to_string())
            } else {
                Ok(7)
            }
        });

        assert_eq!(cache.get(true, &["key"]).unwrap_err(), "first attempt fails");
        assert!(!cache.contains(&["key"]));
        assert_eq!(cache.stats().live_locks, 0);

        assert_eq!(*cache.get(true, &["key"]).unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_first_access_computes_once() {
        let computed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&computed);
        let cache: Arc<KeyedMemoCache<str, Token>> =
            Arc::new(KeyedMemoCache::from_fn(move |_: &[&str]| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Token
            }));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_create(&["key1"])
                })
            })
            .collect();

        let values: Vec<Arc<Token>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(computed.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
        assert_eq!(cache.stats().live_locks, 0);
    }

    #[test]
    fn test_distinct_keys_compute_in_parallel() {
        const COST: Duration = Duration::from_millis(300);
        let cache: Arc<KeyedMemoCache<usize, Token>> =
            Arc::new(KeyedMemoCache::from_fn(|_: &[&usize]| {
                thread::sleep(COST);
                Token
            }));
        let barrier = Arc::new(Barrier::new(4));

        let start = Instant::now();
        let handles: Vec<_> = (0..4usize)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_create(&[&i]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Serialized work would take 4 x COST
        assert!(start.elapsed() < COST * 3);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    #[should_panic(expected = "re-entrant")]
    fn test_reentrant_factory_panics() {
        let slot: Arc<OnceCell<Arc<KeyedMemoCache<str, u32>>>> = Arc::new(OnceCell::new());
        let inner = Arc::clone(&slot);
        let cache = Arc::new(KeyedMemoCache::from_fn(move |parts: &[&str]| {
            let me = inner.get().expect("cache installed");
            *me.get_or_create(parts) + 1
        }));
        let _ = slot.set(Arc::clone(&cache));

        cache.get_or_create(&["loop"]);
    }

    #[test]
    #[should_panic(expected = "re-entrant")]
    fn test_reentrant_uncached_factory_panics() {
        let slot: Arc<OnceCell<Arc<KeyedMemoCache<str, u32>>>> = Arc::new(OnceCell::new());
        let inner = Arc::clone(&slot);
        let cache = Arc::new(KeyedMemoCache::from_fn(move |parts: &[&str]| {
            let me = inner.get().expect("cache installed");
            *me.get(false, parts).unwrap() + 1
        }));
        let _ = slot.set(Arc::clone(&cache));

        let _ = cache.get(false, &["loop"]);
    }

    #[test]
    fn test_nested_access_on_other_key_is_allowed() {
        let slot: Arc<OnceCell<Arc<KeyedMemoCache<str, u32>>>> = Arc::new(OnceCell::new());
        let inner = Arc::clone(&slot);
        let cache = Arc::new(KeyedMemoCache::from_fn(move |parts: &[&str]| {
            if parts == ["outer"] {
                let me = inner.get().expect("cache installed");
                *me.get_or_create(&["inner"]) + 1
            } else {
                1
            }
        }));
        let _ = slot.set(Arc::clone(&cache));

        assert_eq!(*cache.get_or_create(&["outer"]), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_stats() {
        let cache = token_cache();
        cache.get_or_create(&["a"]);
        cache.get_or_create(&["a"]);
        cache.get(false, &["b"]).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.computations, 2);
    }
}
