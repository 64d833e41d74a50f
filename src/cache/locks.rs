//! Per-key Lock Table
//!
//! One mutex per distinct key, created on demand and dropped from the table
//! once no caller holds or waits on it. Callers racing on the same key
//! serialize; callers on different keys never touch the same mutex.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex};

/// Table of per-key mutexes
pub(crate) struct KeyLocks<K: Eq + Hash> {
    table: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Block until the lock for `key` is held by the caller
    pub(crate) fn lock(&self, key: K) -> KeyGuard<'_, K> {
        // Clone the handle out so the shard lock is released before we block
        let mutex = Arc::clone(self.table.entry(key.clone()).or_default().value());
        let guard = mutex.lock_arc();
        KeyGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys with a live lock
    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }
}

/// Held lock for one key; releases and prunes on drop
pub(crate) struct KeyGuard<'a, K: Eq + Hash> {
    locks: &'a KeyLocks<K>,
    key: K,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl<K: Eq + Hash> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        // Unlock and give up our handle first, then prune if nobody else has one
        drop(self.guard.take());
        self.locks
            .table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

// =============================================================================
// Tests
// =============================================================================
