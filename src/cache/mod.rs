//! Concurrent Caches
//!
//! Two building blocks, both safe to share across threads:
//!
//! ```text
//! ┌─────────────────────────────────┐   ┌─────────────────────────────────┐
//! │ KeyedMemoCache                  │   │ BoundedAccessCache              │
//! │  composite key -> Arc<V>        │   │  key -> V, fixed capacity       │
//! │  factory runs once per key      │   │  evicts least recently used     │
//! │  per-key lock on first access   │   │  no factory, plain store        │
//! └─────────────────────────────────┘   └─────────────────────────────────┘
//! ```
//!
//! [`ContextScoped`] is a thin layer over [`KeyedMemoCache`] holding one
//! value per explicit context.

mod key;
mod locks;
mod lru;
mod memo;
mod scoped;

pub use key::{CacheKey, KeyPart};
pub use lru::{BoundedAccessCache, LruStats};
pub use memo::{KeyedMemoCache, MemoStats};
pub use scoped::ContextScoped;

/// Default capacity for the classifier's bounded caches
pub const DEFAULT_CAPACITY: usize = 1024;
