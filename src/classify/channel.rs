//! Output Channels
//!
//! The classifier writes every emitted failure to two independent sinks:
//!
//! - application: message plus full context (kind and cause chain)
//! - monitoring: message only
//!
//! Each sink decides for itself which severities it accepts.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::severity::Severity;

/// tracing target of the application channel
pub const APPLICATION_TARGET: &str = "faultmap::application";

/// tracing target of the monitoring channel
pub const MONITORING_TARGET: &str = "faultmap::monitoring";

/// One emission handed to a channel
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// Resolved or caller-supplied severity
    pub severity: Severity,
    /// Resolved code, if any
    pub code: Option<&'a str>,
    /// Formatted message
    pub message: &'a str,
    /// Concrete failure type (application channel only)
    pub kind: Option<&'a str>,
    /// Rendered cause chain (application channel only)
    pub detail: Option<&'a str>,
}

impl Record<'_> {
    /// Copy without kind and detail, as sent to the monitoring channel
    pub fn message_only(&self) -> Self {
        Self {
            kind: None,
            detail: None,
            ..*self
        }
    }
}

/// Sink for classified failures
pub trait Channel: Send + Sync {
    /// Check if this channel currently accepts `severity`
    fn enabled(&self, severity: Severity) -> bool;

    /// Write a record; only called when `enabled(record.severity)` holds
    fn emit(&self, record: &Record<'_>);
}

// =============================================================================
// tracing-backed channels
// =============================================================================

macro_rules! enabled_at {
    ($target:expr, $severity:expr) => {
        match $severity {
            Severity::Trace => tracing::enabled!(target: $target, tracing::Level::TRACE),
            Severity::Debug => tracing::enabled!(target: $target, tracing::Level::DEBUG),
            Severity::Info => tracing::enabled!(target: $target, tracing::Level::INFO),
            Severity::Warn => tracing::enabled!(target: $target, tracing::Level::WARN),
            Severity::Error => tracing::enabled!(target: $target, tracing::Level::ERROR),
            Severity::Off => false,
        }
    };
}

macro_rules! event_at {
    ($target:expr, $severity:expr, $($rest:tt)+) => {
        match $severity {
            Severity::Trace => tracing::event!(target: $target, tracing::Level::TRACE, $($rest)+),
            Severity::Debug => tracing::event!(target: $target, tracing::Level::DEBUG, $($rest)+),
            Severity::Info => tracing::event!(target: $target, tracing::Level::INFO, $($rest)+),
            Severity::Warn => tracing::event!(target: $target, tracing::Level::WARN, $($rest)+),
            Severity::Error => tracing::event!(target: $target, tracing::Level::ERROR, $($rest)+),
            Severity::Off => {}
        }
    };
}

/// Channel that forwards records as `tracing` events
///
/// Filtering follows the installed subscriber, so
/// `RUST_LOG=faultmap::monitoring=off` silences only the monitoring channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingChannel {
    /// Emits under [`APPLICATION_TARGET`] with code, kind and detail fields
    Application,
    /// Emits under [`MONITORING_TARGET`] with the code field only
    Monitoring,
}

impl Channel for TracingChannel {
    fn enabled(&self, severity: Severity) -> bool {
        match self {
            TracingChannel::Application => enabled_at!(APPLICATION_TARGET, severity),
            TracingChannel::Monitoring => enabled_at!(MONITORING_TARGET, severity),
        }
    }

    fn emit(&self, record: &Record<'_>) {
        match self {
            TracingChannel::Application => event_at!(
                APPLICATION_TARGET,
                record.severity,
                code = record.code,
                kind = record.kind,
                detail = record.detail,
                "{}",
                record.message
            ),
            TracingChannel::Monitoring => event_at!(
                MONITORING_TARGET,
                record.severity,
                code = record.code,
                "{}",
                record.message
            ),
        }
    }
}

// =============================================================================
// In-memory channel
// =============================================================================

/// Record captured by a [`MemoryChannel`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedRecord {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub kind: Option<String>,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

/// Channel keeping records in memory, with a minimum accepted severity
#[derive(Debug)]
pub struct MemoryChannel {
    threshold: RwLock<Severity>,
    records: Mutex<Vec<CapturedRecord>>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::with_threshold(Severity::Trace)
    }
}

impl MemoryChannel {
    /// Channel accepting every emittable severity
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel accepting `threshold` and anything more severe
    pub fn with_threshold(threshold: Severity) -> Self {
        Self {
            threshold: RwLock::new(threshold),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Channel accepting nothing
    pub fn disabled() -> Self {
        Self::with_threshold(Severity::Off)
    }

    /// Change the minimum accepted severity
    pub fn set_threshold(&self, threshold: Severity) {
        *self.threshold.write() = threshold;
    }

    /// Snapshot of captured records
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().clone()
    }

    /// Captured messages, in emission order
    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|r| r.message.clone())
            .collect()
    }

    /// Number of captured records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if nothing was captured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget captured records
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Channel for MemoryChannel {
    fn enabled(&self, severity: Severity) -> bool {
        let threshold = *self.threshold.read();
        severity != Severity::Off && threshold != Severity::Off && severity >= threshold
    }

    fn emit(&self, record: &Record<'_>) {
        self.records.lock().push(CapturedRecord {
            severity: record.severity,
            code: record.code.map(str::to_string),
            message: record.message.to_string(),
            kind: record.kind.map(str::to_string),
            detail: record.detail.map(str::to_string),
            at: Utc::now(),
        });
    }
}
