//! Severity Levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Severity of a classified failure, least to most severe
///
/// `Off` is never emitted on any channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Severity {
    /// All levels that can actually be emitted
    pub const EMITTABLE: [Severity; 5] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
    ];

    /// Most severe emittable level
    pub const fn most_severe() -> Self {
        Severity::Error
    }

    /// Matching tracing level, `None` for `Off`
    pub fn as_tracing(&self) -> Option<tracing::Level> {
        match self {
            Severity::Trace => Some(tracing::Level::TRACE),
            Severity::Debug => Some(tracing::Level::DEBUG),
            Severity::Info => Some(tracing::Level::INFO),
            Severity::Warn => Some(tracing::Level::WARN),
            Severity::Error => Some(tracing::Level::ERROR),
            Severity::Off => None,
        }
    }

    /// Lowercase literal
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Off => "off",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::most_severe()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            "off" => Ok(Severity::Off),
            _ => Err(Error::InvalidSeverity(s.to_string())),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}
