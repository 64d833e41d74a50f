//! Classifier Configuration
//!
//! Rules are ordered lists; the first matching entry wins, so YAML files
//! list them as sequences rather than maps:
//!
//! ```yaml
//! code_rules:
//!   - pattern: NullValue
//!     code: e.cm.888
//!   - pattern: Runtime
//!     code: w.cm.777
//! severity_rules:
//!   - pattern: "e."
//!     severity: error
//!   - pattern: "w."
//!     severity: warn
//! default_code: e.cm.999
//! default_severity: error
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CAPACITY;
use crate::error::{Error, Result};

/// Maps a substring of a failure type name to a code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRule {
    pub pattern: String,
    pub code: String,
}

/// Maps a substring of a code to a severity literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityRule {
    pub pattern: String,
    pub severity: String,
}

/// Classifier configuration
///
/// Severity literals stay unparsed here; they are validated when the
/// classifier is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Ordered code rules matched against the failure's lineage
    pub code_rules: Vec<CodeRule>,
    /// Ordered severity rules matched against the resolved code
    pub severity_rules: Vec<SeverityRule>,
    /// Code used when no rule matches
    pub default_code: Option<String>,
    /// Severity used when no rule matches; must not be null
    pub default_severity: Option<String>,
    /// Capacity of the type-to-code cache
    pub code_cache_capacity: usize,
    /// Capacity of the code-to-severity cache
    pub severity_cache_capacity: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            code_rules: Vec::new(),
            severity_rules: Vec::new(),
            default_code: None,
            default_severity: Some("error".to_string()),
            code_cache_capacity: DEFAULT_CAPACITY,
            severity_cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ClassifierConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject rules with an empty pattern
    ///
    /// An empty pattern matches every subject, so every later rule would be
    /// unreachable.
    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self.code_rules.iter().position(|r| r.pattern.is_empty()) {
            return Err(Error::Config(format!("code rule {index} has an empty pattern")));
        }
        if let Some(index) = self.severity_rules.iter().position(|r| r.pattern.is_empty()) {
            return Err(Error::Config(format!(
                "severity rule {index} has an empty pattern"
            )));
        }
        Ok(())
    }

    /// Append a code rule
    pub fn with_code_rule(mut self, pattern: impl Into<String>, code: impl Into<String>) -> Self {
        self.code_rules.push(CodeRule {
            pattern: pattern.into(),
            code: code.into(),
        });
        self
    }

    /// Append a severity rule
    pub fn with_severity_rule(
        mut self,
        pattern: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        self.severity_rules.push(SeverityRule {
            pattern: pattern.into(),
            severity: severity.into(),
        });
        self
    }

    /// Set the fallback code
    pub fn with_default_code(mut self, code: impl Into<String>) -> Self {
        self.default_code = Some(code.into());
        self
    }

    /// Set the fallback severity
    pub fn with_default_severity(mut self, severity: impl Into<String>) -> Self {
        self.default_severity = Some(severity.into());
        self
    }

    /// Set both cache capacities
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.code_cache_capacity = capacity;
        self.severity_cache_capacity = capacity;
        self
    }
}
