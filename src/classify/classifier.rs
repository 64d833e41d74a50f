//! Failure Classifier
//!
//! Maps a failure to a code via ordered rules over its type lineage, maps
//! the code to a severity via ordered rules over the code text, and emits
//! the result on the application and monitoring channels.
//!
//! Both resolutions are memoized in bounded caches:
//!
//! ```text
//! failure ────kind─────▶ [code cache] ──miss──▶ code rules (lineage walk)
//!    │                                              │
//!    │                     code (or default) ◀──────┘
//!    ▼
//! code ────────────────▶ [severity cache] ──miss──▶ severity rules
//! ```
//!
//! A miss that matches no rule stores the default, so unmatched kinds are
//! not rescanned.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use super::channel::{Channel, Record, TracingChannel};
use super::failure::{render_chain, Classifiable, FailureKind};
use super::rules::RuleSet;
use super::severity::Severity;
use crate::cache::{BoundedAccessCache, LruStats};
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};

/// Outcome of classifying one failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Resolved code, absent when no rule matched and no default is set
    pub code: Option<String>,
    /// Resolved severity
    pub severity: Severity,
}

/// Classifier counters and cache statistics
#[derive(Debug, Clone)]
pub struct ClassifierStats {
    /// Code resolutions requested
    pub resolutions: u64,
    /// Lineage walks over the code rules (code cache misses)
    pub code_walks: u64,
    /// Scans over the severity rules (severity cache misses)
    pub severity_scans: u64,
    /// Type-to-code cache
    pub code_cache: LruStats,
    /// Code-to-severity cache
    pub severity_cache: LruStats,
}

/// Rule-driven failure classifier
///
/// Safe to share between threads; all state is behind the caches and
/// atomic counters.
pub struct FailureClassifier {
    code_rules: RuleSet<String>,
    severity_rules: RuleSet<Severity>,
    default_code: Option<String>,
    default_severity: Severity,
    /// kind (whole lineage) -> code; absent codes are cached too
    code_cache: BoundedAccessCache<FailureKind, Option<String>>,
    /// code -> severity; an absent code is keyed as ""
    severity_cache: BoundedAccessCache<String, Severity>,
    /// Every severity a resolution can produce
    reachable: Vec<Severity>,
    application: Arc<dyn Channel>,
    monitoring: Arc<dyn Channel>,
    resolutions: AtomicU64,
    code_walks: AtomicU64,
    severity_scans: AtomicU64,
}

impl FailureClassifier {
    /// Build a classifier writing to the given channels
    ///
    /// Fails on an empty rule pattern, an unknown severity literal, a null
    /// default severity or a zero cache capacity.
    pub fn new(
        config: &ClassifierConfig,
        application: Arc<dyn Channel>,
        monitoring: Arc<dyn Channel>,
    ) -> Result<Self> {
        config.validate()?;

        let code_rules: RuleSet<String> = config
            .code_rules
            .iter()
            .map(|rule| (rule.pattern.clone(), rule.code.clone()))
            .collect();

        let mut severity_rules = RuleSet::new();
        for rule in &config.severity_rules {
            severity_rules.push(rule.pattern.clone(), rule.severity.parse::<Severity>()?);
        }

        let default_severity = config
            .default_severity
            .as_deref()
            .ok_or(Error::MissingDefaultSeverity)?
            .parse::<Severity>()?;

        let code_cache = BoundedAccessCache::new(config.code_cache_capacity).map_err(|_| {
            Error::InvalidCapacity {
                name: "code_cache_capacity".to_string(),
                capacity: config.code_cache_capacity,
            }
        })?;
        let severity_cache =
            BoundedAccessCache::new(config.severity_cache_capacity).map_err(|_| {
                Error::InvalidCapacity {
                    name: "severity_cache_capacity".to_string(),
                    capacity: config.severity_cache_capacity,
                }
            })?;

        let mut reachable: Vec<Severity> = std::iter::once(default_severity)
            .chain(severity_rules.values().copied())
            .filter(|s| *s != Severity::Off)
            .collect();
        reachable.sort();
        reachable.dedup();

        debug!(
            code_rules = code_rules.len(),
            severity_rules = severity_rules.len(),
            default_code = ?config.default_code,
            %default_severity,
            "Failure classifier configured"
        );

        Ok(Self {
            code_rules,
            severity_rules,
            default_code: config.default_code.clone(),
            default_severity,
            code_cache,
            severity_cache,
            reachable,
            application,
            monitoring,
            resolutions: AtomicU64::new(0),
            code_walks: AtomicU64::new(0),
            severity_scans: AtomicU64::new(0),
        })
    }

    /// Build a classifier emitting through `tracing`
    pub fn with_tracing(config: &ClassifierConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(TracingChannel::Application),
            Arc::new(TracingChannel::Monitoring),
        )
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Code for `failure`
    ///
    /// An explicit code on the failure wins and is never cached.
    pub fn resolve_code(&self, failure: &dyn Classifiable) -> Option<String> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        if let Some(code) = failure.code() {
            return Some(code.to_string());
        }
        self.code_for_kind(failure.kind())
    }

    /// Code for a failure kind, ignoring any explicit code
    pub fn code_for_kind(&self, kind: &FailureKind) -> Option<String> {
        if let Some(code) = self.code_cache.get(kind) {
            return code;
        }

        self.code_walks.fetch_add(1, Ordering::Relaxed);
        let code = self
            .code_rules
            .match_kind(kind)
            .or(self.default_code.as_ref())
            .cloned();
        debug!(kind = kind.name(), code = ?code, "Resolved failure code");

        self.code_cache.put(kind.clone(), code.clone());
        code
    }

    /// Severity for a resolved code
    pub fn resolve_severity(&self, code: Option<&str>) -> Severity {
        if self.severity_rules.is_empty() {
            return self.default_severity;
        }

        let subject = code.unwrap_or("");
        if let Some(severity) = self.severity_cache.get(subject) {
            return severity;
        }

        self.severity_scans.fetch_add(1, Ordering::Relaxed);
        let severity = self
            .severity_rules
            .match_text(subject)
            .copied()
            .unwrap_or(self.default_severity);

        self.severity_cache.put(subject.to_string(), severity);
        severity
    }

    /// Code and severity for `failure`
    #[instrument(level = "debug", skip(self, failure), fields(kind = %failure.kind()))]
    pub fn classify(&self, failure: &dyn Classifiable) -> Classification {
        let code = self.resolve_code(failure);
        let severity = self.resolve_severity(code.as_deref());
        Classification { code, severity }
    }

    /// Check if either channel accepts `severity`
    pub fn is_enabled(&self, severity: Severity) -> bool {
        severity != Severity::Off
            && (self.application.enabled(severity) || self.monitoring.enabled(severity))
    }

    // =========================================================================
    // Emission
    // =========================================================================

    /// Classify and emit `failure`
    ///
    /// Does nothing, not even resolution, when no severity the rules can
    /// produce is enabled.
    #[instrument(level = "debug", skip(self, failure), fields(kind = %failure.kind()))]
    pub fn log(&self, failure: &dyn Classifiable) {
        if !self.any_reachable_enabled() {
            return;
        }
        let Classification { code, severity } = self.classify(failure);
        if !self.is_enabled(severity) {
            return;
        }
        let message = format_message(code.as_deref(), &failure.to_string());
        self.emit(severity, code.as_deref(), &message, failure);
    }

    /// Classify `failure` but emit `message` verbatim
    pub fn log_message(&self, message: &str, failure: &dyn Classifiable) {
        if !self.any_reachable_enabled() {
            return;
        }
        let Classification { code, severity } = self.classify(failure);
        if self.is_enabled(severity) {
            self.emit(severity, code.as_deref(), message, failure);
        }
    }

    /// Emit `failure` at a caller-chosen severity
    pub fn log_at(&self, severity: Severity, failure: &dyn Classifiable) {
        if !self.is_enabled(severity) {
            return;
        }
        let code = self.resolve_code(failure);
        let message = format_message(code.as_deref(), &failure.to_string());
        self.emit(severity, code.as_deref(), &message, failure);
    }

    /// Emit `message` at a caller-chosen severity, without rule lookups
    pub fn log_message_at(&self, severity: Severity, message: &str, failure: &dyn Classifiable) {
        if self.is_enabled(severity) {
            self.emit(severity, failure.code(), message, failure);
        }
    }

    /// Emit `failure` as a warning
    pub fn warn(&self, failure: &dyn Classifiable) {
        self.log_at(Severity::Warn, failure);
    }

    /// Emit `failure` as an error
    pub fn error(&self, failure: &dyn Classifiable) {
        self.log_at(Severity::Error, failure);
    }

    /// Log the error of `result`, if any, and hand the result back
    pub fn inspect<T, F: Classifiable>(
        &self,
        result: std::result::Result<T, F>,
    ) -> std::result::Result<T, F> {
        if let Err(failure) = &result {
            self.log(failure);
        }
        result
    }

    fn any_reachable_enabled(&self) -> bool {
        self.reachable.iter().any(|s| self.is_enabled(*s))
    }

    fn emit(
        &self,
        severity: Severity,
        code: Option<&str>,
        message: &str,
        failure: &dyn Classifiable,
    ) {
        let record = Record {
            severity,
            code,
            message,
            kind: Some(failure.kind().name()),
            detail: None,
        };

        if self.monitoring.enabled(severity) {
            self.monitoring.emit(&record.message_only());
        }
        if self.application.enabled(severity) {
            let detail = render_chain(failure);
            self.application.emit(&Record {
                detail: Some(&detail),
                ..record
            });
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Configured fallback severity
    pub fn default_severity(&self) -> Severity {
        self.default_severity
    }

    /// Configured fallback code
    pub fn default_code(&self) -> Option<&str> {
        self.default_code.as_deref()
    }

    /// Code rules, in match order
    pub fn code_rules(&self) -> &RuleSet<String> {
        &self.code_rules
    }

    /// Severity rules, in match order
    pub fn severity_rules(&self) -> &RuleSet<Severity> {
        &self.severity_rules
    }

    /// Drop both caches
    pub fn clear_caches(&self) {
        self.code_cache.clear();
        self.severity_cache.clear();
    }

    /// Counters and cache statistics
    pub fn stats(&self) -> ClassifierStats {
        ClassifierStats {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            code_walks: self.code_walks.load(Ordering::Relaxed),
            severity_scans: self.severity_scans.load(Ordering::Relaxed),
            code_cache: self.code_cache.stats(),
            severity_cache: self.severity_cache.stats(),
        }
    }
}

impl fmt::Debug for FailureClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureClassifier")
            .field("code_rules", &self.code_rules)
            .field("severity_rules", &self.severity_rules)
            .field("default_code", &self.default_code)
            .field("default_severity", &self.default_severity)
            .field("code_cache", &self.code_cache)
            .field("severity_cache", &self.severity_cache)
            .finish_non_exhaustive()
    }
}

/// `"[code] message"`, or `message` alone when the code is absent or empty
pub fn format_message(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) if !code.is_empty() => format!("[{code}] {message}"),
        _ => message.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::channel::MemoryChannel;
    use crate::classify::failure::{kinds, Failure};
    use assert_matches::assert_matches;
    use std::sync::Barrier;
    use std::thread;

    fn config() -> ClassifierConfig {
        ClassifierConfig::default()
            .with_code_rule("NullValue", "e.cm.888")
            .with_code_rule("Runtime", "w.cm.777")
            .with_severity_rule("e.", "error")
            .with_severity_rule("w.", "warn")
    }

    struct Fixture {
        classifier: FailureClassifier,
        application: Arc<MemoryChannel>,
        monitoring: Arc<MemoryChannel>,
    }

    fn fixture(config: ClassifierConfig) -> Fixture {
        let application = Arc::new(MemoryChannel::new());
        let monitoring = Arc::new(MemoryChannel::new());
        let classifier =
            FailureClassifier::new(&config, application.clone(), monitoring.clone()).unwrap();
        Fixture {
            classifier,
            application,
            monitoring,
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn test_rejects_unknown_severity() {
        let config = config().with_severity_rule("x.", "fatal");
        assert_matches!(
            FailureClassifier::with_tracing(&config),
            Err(Error::InvalidSeverity(s)) if s == "fatal"
        );
    }

    #[test]
    fn test_rejects_null_default_severity() {
        let mut config = config();
        config.default_severity = None;
        assert_matches!(
            FailureClassifier::with_tracing(&config),
            Err(Error::MissingDefaultSeverity)
        );
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = config();
        config.severity_cache_capacity = 0;
        assert_matches!(
            FailureClassifier::with_tracing(&config),
            Err(Error::InvalidCapacity { name, capacity: 0 }) if name == "severity_cache_capacity"
        );
    }

    // =========================================================================
    // Code resolution
    // =========================================================================

    #[test]
    fn test_first_rule_wins() {
        let f = fixture(config());
        let npe = Failure::new(kinds::NULL_VALUE.clone(), "missing id");
        let state = Failure::new(kinds::ILLEGAL_STATE.clone(), "not started");

        // NullValue extends Runtime, but the NullValue rule is listed first
        assert_eq!(f.classifier.resolve_code(&npe).as_deref(), Some("e.cm.888"));
        assert_eq!(f.classifier.resolve_code(&state).as_deref(), Some("w.cm.777"));
    }

    #[test]
    fn test_unmatched_kind_cached_as_default() {
        let f = fixture(config());
        let io = Failure::new(kinds::FILE_NOT_FOUND.clone(), "gone");

        assert_eq!(f.classifier.resolve_code(&io), None);
        assert_eq!(f.classifier.resolve_code(&io), None);

        let stats = f.classifier.stats();
        assert_eq!(stats.code_walks, 1);
        assert_eq!(stats.resolutions, 2);
        assert_eq!(stats.code_cache.entries, 1);
    }

    #[test]
    fn test_same_name_different_lineage_resolved_separately() {
        let f = fixture(ClassifierConfig::default().with_code_rule("Runtime", "w.cm.777"));
        let top = FailureKind::new("app.Custom");
        let derived = kinds::RUNTIME.extend("app.Custom");

        assert_eq!(f.classifier.code_for_kind(&top), None);
        assert_eq!(f.classifier.code_for_kind(&derived).as_deref(), Some("w.cm.777"));
        assert_eq!(f.classifier.code_for_kind(&top), None);

        let stats = f.classifier.stats();
        assert_eq!(stats.code_walks, 2);
        assert_eq!(stats.code_cache.entries, 2);
    }

    #[test]
    fn test_default_code_applies() {
        let f = fixture(config().with_default_code("e.cm.999"));
        let io = Failure::new(kinds::IO.clone(), "broken pipe");
        assert_eq!(f.classifier.resolve_code(&io).as_deref(), Some("e.cm.999"));
    }

    #[test]
    fn test_explicit_code_bypasses_rules() {
        let f = fixture(config());
        let failure = Failure::new(kinds::NULL_VALUE.clone(), "boom").with_code("i.cm.001");

        assert_eq!(f.classifier.resolve_code(&failure).as_deref(), Some("i.cm.001"));
        let stats = f.classifier.stats();
        assert_eq!(stats.code_walks, 0);
        assert_eq!(stats.code_cache.entries, 0);
    }

    // =========================================================================
    // Severity resolution
    // =========================================================================

    #[test]
    fn test_severity_rules() {
        let f = fixture(config().with_default_severity("info"));
        assert_eq!(f.classifier.resolve_severity(Some("e.cm.888")), Severity::Error);
        assert_eq!(f.classifier.resolve_severity(Some("w.cm.777")), Severity::Warn);
        assert_eq!(f.classifier.resolve_severity(Some("x.cm.000")), Severity::Info);
        assert_eq!(f.classifier.resolve_severity(None), Severity::Info);

        f.classifier.resolve_severity(Some("w.cm.777"));
        assert_eq!(f.classifier.stats().severity_scans, 4);
    }

    #[test]
    fn test_empty_severity_rules_skip_cache() {
        let f = fixture(ClassifierConfig::default().with_default_severity("warn"));
        assert_eq!(f.classifier.resolve_severity(Some("e.cm.888")), Severity::Warn);

        let stats = f.classifier.stats();
        assert_eq!(stats.severity_scans, 0);
        assert_eq!(stats.severity_cache.hits + stats.severity_cache.misses, 0);
    }

    #[test]
    fn test_classify() {
        let f = fixture(config());
        let failure = Failure::new(kinds::ILLEGAL_ARGUMENT.clone(), "bad port");
        assert_eq!(
            f.classifier.classify(&failure),
            Classification {
                code: Some("w.cm.777".to_string()),
                severity: Severity::Warn,
            }
        );
    }

    // =========================================================================
    // Emission
    // =========================================================================

    #[test]
    fn test_log_writes_both_channels() {
        let f = fixture(config());
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let failure = Failure::new(kinds::NULL_VALUE.clone(), "missing id").with_source(cause);

        f.classifier.log(&failure);

        let app = f.application.records();
        assert_eq!(app.len(), 1);
        assert_eq!(app[0].message, "[e.cm.888] missing id");
        assert_eq!(app[0].severity, Severity::Error);
        assert_eq!(app[0].kind.as_deref(), Some("faultmap.NullValueFailure"));
        assert!(app[0].detail.as_deref().unwrap().contains("Caused by: socket closed"));

        let mon = f.monitoring.records();
        assert_eq!(mon.len(), 1);
        assert_eq!(mon[0].message, "[e.cm.888] missing id");
        assert_eq!(mon[0].code.as_deref(), Some("e.cm.888"));
        assert_eq!(mon[0].kind, None);
        assert_eq!(mon[0].detail, None);
    }

    #[test]
    fn test_log_without_code_has_no_prefix() {
        let f = fixture(config());
        f.classifier.log(&Failure::new(kinds::IO.clone(), "disk full"));
        assert_eq!(f.application.messages(), vec!["disk full"]);
    }

    #[test]
    fn test_all_disabled_skips_resolution() {
        let application = Arc::new(MemoryChannel::disabled());
        let monitoring = Arc::new(MemoryChannel::disabled());
        let classifier =
            FailureClassifier::new(&config(), application.clone(), monitoring.clone()).unwrap();

        let failure = Failure::new(kinds::NULL_VALUE.clone(), "missing id");
        classifier.log(&failure);
        classifier.log_message("custom", &failure);
        classifier.warn(&failure);

        let stats = classifier.stats();
        assert_eq!(stats.resolutions, 0);
        assert_eq!(stats.code_walks, 0);
        assert!(application.is_empty());
        assert!(monitoring.is_empty());
    }

    #[test]
    fn test_resolved_severity_below_threshold() {
        let f = fixture(config());
        f.application.set_threshold(Severity::Error);
        f.monitoring.set_threshold(Severity::Error);

        f.classifier.log(&Failure::new(kinds::ILLEGAL_STATE.clone(), "not started"));
        assert!(f.application.is_empty());
        assert!(f.monitoring.is_empty());

        f.classifier.log(&Failure::new(kinds::NULL_VALUE.clone(), "missing id"));
        assert_eq!(f.application.len(), 1);
        assert_eq!(f.monitoring.len(), 1);
    }

    #[test]
    fn test_channels_filter_independently() {
        let f = fixture(config());
        f.monitoring.set_threshold(Severity::Off);

        f.classifier.log(&Failure::new(kinds::ILLEGAL_STATE.clone(), "not started"));
        assert_eq!(f.application.len(), 1);
        assert!(f.monitoring.is_empty());
    }

    #[test]
    fn test_monitoring_alone_keeps_logging_enabled() {
        let f = fixture(config());
        f.application.set_threshold(Severity::Off);

        assert!(f.classifier.is_enabled(Severity::Warn));
        f.classifier.log(&Failure::new(kinds::ILLEGAL_STATE.clone(), "not started"));

        assert!(f.application.is_empty());
        let mon = f.monitoring.records();
        assert_eq!(mon.len(), 1);
        assert_eq!(mon[0].message, "[w.cm.777] not started");
        assert_eq!(mon[0].severity, Severity::Warn);
    }

    #[test]
    fn test_explicit_severity_variants() {
        let f = fixture(config());
        let failure = Failure::new(kinds::NULL_VALUE.clone(), "missing id");

        f.classifier.warn(&failure);
        f.classifier.log_message_at(Severity::Info, "custom text", &failure);

        let app = f.application.records();
        assert_eq!(app[0].severity, Severity::Warn);
        assert_eq!(app[0].message, "[e.cm.888] missing id");
        assert_eq!(app[1].severity, Severity::Info);
        assert_eq!(app[1].message, "custom text");
        assert_eq!(app[1].code, None);
    }

    #[test]
    fn test_log_message_keeps_caller_text() {
        let f = fixture(config());
        let failure = Failure::new(kinds::ILLEGAL_STATE.clone(), "not started");
        f.classifier.log_message("worker pool stalled", &failure);

        let app = f.application.records();
        assert_eq!(app[0].message, "worker pool stalled");
        assert_eq!(app[0].severity, Severity::Warn);
        assert_eq!(app[0].code.as_deref(), Some("w.cm.777"));
    }

    #[test]
    fn test_inspect_passes_result_through() {
        let f = fixture(config());
        let ok: std::result::Result<u32, Failure> = Ok(7);
        assert_eq!(f.classifier.inspect(ok).unwrap(), 7);
        assert!(f.application.is_empty());

        let err: std::result::Result<u32, Failure> =
            Err(Failure::new(kinds::UNSUPPORTED.clone(), "no such verb"));
        let returned = f.classifier.inspect(err);
        assert_eq!(returned.unwrap_err().message(), "no such verb");
        assert_eq!(f.application.messages(), vec!["[w.cm.777] no such verb"]);
    }

    #[test]
    fn test_format_message() {
        assert_eq!(format_message(Some("e.cm.888"), "boom"), "[e.cm.888] boom");
        assert_eq!(format_message(Some(""), "boom"), "boom");
        assert_eq!(format_message(None, "boom"), "boom");
    }

    // =========================================================================
    // Concurrency
    // =========================================================================

    #[test]
    fn test_concurrent_logging() {
        let f = Arc::new(fixture(config()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let f = f.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for j in 0..50 {
                        let kind = if (i + j) % 2 == 0 {
                            kinds::NULL_VALUE.clone()
                        } else {
                            kinds::ILLEGAL_STATE.clone()
                        };
                        f.classifier.log(&Failure::new(kind, format!("t{i} #{j}")));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(f.application.len(), 400);
        assert_eq!(f.monitoring.len(), 400);
        let stats = f.classifier.stats();
        assert_eq!(stats.resolutions, 400);
        assert_eq!(stats.code_cache.entries, 2);
        // Racing misses may each walk once, never more than once per thread
        assert!(stats.code_walks >= 2 && stats.code_walks <= 16);
    }
}
