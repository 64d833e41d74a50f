//! Compiled Pattern Cache
//!
//! Regular expressions are compiled once per distinct source string and
//! shared afterwards. Invalid patterns return an error every time they are
//! requested; nothing is stored for them.

use std::sync::Arc;

use regex::Regex;

use crate::cache::KeyedMemoCache;
use crate::error::Result;

/// Cache of compiled regular expressions keyed by their source
#[derive(Debug)]
pub struct PatternCache {
    compiled: KeyedMemoCache<str, Regex, regex::Error>,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternCache {
    /// Create an empty pattern cache
    pub fn new() -> Self {
        Self {
            compiled: KeyedMemoCache::new(|parts: &[&str]| Regex::new(&parts.concat())),
        }
    }

    /// Get the compiled form of `source`
    pub fn pattern(&self, source: &str) -> Result<Arc<Regex>> {
        Ok(self.compiled.get(true, &[source])?)
    }

    /// Check `text` against `source`, compiling it if needed
    pub fn is_match(&self, source: &str, text: &str) -> Result<bool> {
        Ok(self.pattern(source)?.is_match(text))
    }

    /// Number of compiled patterns held
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Check if no pattern has been compiled
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    /// Drop every compiled pattern
    pub fn clear(&self) {
        self.compiled.clear();
    }
}
