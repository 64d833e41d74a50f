//! faultmap - Concurrent Caches and Failure Classification
//!
//! Thread-safe caching primitives plus a rule-driven classifier that maps
//! failures to codes and severities and reports them on two channels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           faultmap                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────────┐   ┌────────────────┐   ┌──────────────┐  │
//! │  │ KeyedMemoCache │   │ BoundedAccess  │   │ PatternCache │  │
//! │  │ (build once)   │   │ Cache (LRU)    │   │ (regex)      │  │
//! │  └────────────────┘   └───────┬────────┘   └──────────────┘  │
//! │                               │                              │
//! │                      ┌────────▼──────────┐                   │
//! │                      │ FailureClassifier │                   │
//! │                      └───────────────────┘                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`] - keyed memo cache, bounded LRU cache, per-context slots
//! - [`classify`] - failure kinds, rules, severities, channels, classifier
//! - [`config`] - YAML-backed classifier configuration
//! - [`error`] - Error types
//! - [`pattern`] - compiled regular expression cache

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod pattern;

// Re-export commonly used types
pub use cache::{BoundedAccessCache, CacheKey, ContextScoped, KeyPart, KeyedMemoCache};
pub use classify::{
    Channel, Classifiable, Classification, Failure, FailureClassifier, FailureKind,
    MemoryChannel, RuleSet, Severity, TracingChannel,
};
pub use config::ClassifierConfig;
pub use error::{Error, Result};
pub use pattern::PatternCache;
