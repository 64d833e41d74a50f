//! First-Match Pattern Rules
//!
//! An ordered list of `(substring, value)` pairs. The earliest pattern found
//! inside the subject decides the value; insertion order is significant.

use std::fmt;

use super::failure::FailureKind;

/// Ordered substring rules mapping to values of type `V`
#[derive(Clone, PartialEq, Eq)]
pub struct RuleSet<V> {
    rules: Vec<(String, V)>,
}

impl<V> Default for RuleSet<V> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<V> RuleSet<V> {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; earlier rules win
    pub fn push(&mut self, pattern: impl Into<String>, value: V) {
        self.rules.push((pattern.into(), value));
    }

    /// Builder form of [`RuleSet::push`]
    pub fn with(mut self, pattern: impl Into<String>, value: V) -> Self {
        self.push(pattern, value);
        self
    }

    /// Value of the first rule whose pattern occurs in `subject`
    pub fn match_text(&self, subject: &str) -> Option<&V> {
        self.rules
            .iter()
            .find(|(pattern, _)| subject.contains(pattern.as_str()))
            .map(|(_, value)| value)
    }

    /// Value of the first rule whose pattern occurs in any name of the
    /// lineage. Rules are tried in order; for each rule the whole lineage is
    /// scanned before moving to the next rule.
    pub fn match_ancestry<'a, I>(&self, ancestry: I) -> Option<&V>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if self.rules.is_empty() {
            return None;
        }
        let names: Vec<&str> = ancestry.into_iter().collect();
        self.rules
            .iter()
            .find(|(pattern, _)| names.iter().any(|name| name.contains(pattern.as_str())))
            .map(|(_, value)| value)
    }

    /// Shorthand for [`RuleSet::match_ancestry`] over a kind's lineage
    pub fn match_kind(&self, kind: &FailureKind) -> Option<&V> {
        self.match_ancestry(kind.ancestry())
    }

    /// Iterate over the values of all rules, in order
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rules.iter().map(|(_, value)| value)
    }

    /// Iterate over `(pattern, value)` pairs, in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.rules.iter().map(|(pattern, value)| (pattern.as_str(), value))
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<V, P: Into<String>> FromIterator<(P, V)> for RuleSet<V> {
    fn from_iter<T: IntoIterator<Item = (P, V)>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().map(|(p, v)| (p.into(), v)).collect(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for RuleSet<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
