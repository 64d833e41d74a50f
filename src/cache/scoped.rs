//! Context-Scoped Slots
//!
//! One lazily built value per explicit context (a request id, a worker name,
//! a tenant). The context is passed by the caller rather than inferred from
//! the current thread, so values never leak between contexts that happen to
//! share a thread.

use std::fmt;
use std::sync::Arc;

use super::key::KeyPart;
use super::memo::KeyedMemoCache;

/// Per-context value slots
pub struct ContextScoped<C: KeyPart + ?Sized, V> {
    slots: KeyedMemoCache<C, V>,
}

impl<C: KeyPart + ?Sized, V> ContextScoped<C, V> {
    /// Create slots whose values are built by `factory` on first use
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&C) -> V + Send + Sync + 'static,
    {
        Self {
            slots: KeyedMemoCache::from_fn(move |parts: &[&C]| match parts {
                [context] => factory(context),
                _ => unreachable!("context slots are keyed by exactly one part"),
            }),
        }
    }

    /// Value for `context`, built on first access
    pub fn get(&self, context: &C) -> Arc<V> {
        self.slots.get_or_create(&[context])
    }

    /// Drop the value held for `context`, returning it
    pub fn release(&self, context: &C) -> Option<Arc<V>> {
        self.slots.remove(&[context])
    }

    /// Number of live contexts
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no context holds a value
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<C: KeyPart + ?Sized, V> fmt::Debug for ContextScoped<C, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScoped")
            .field("contexts", &self.slots.len())
            .finish()
    }
}
