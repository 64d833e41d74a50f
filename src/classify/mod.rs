//! Failure Classification
//!
//! ```text
//! ┌──────────────┐    ┌──────────────────────┐    ┌───────────────────┐
//! │ Classifiable │───▶│  FailureClassifier   │───▶│ application chan. │
//! │ (kind, msg,  │    │  code rules (RuleSet)│    ├───────────────────┤
//! │  code, cause)│    │  severity rules      │───▶│ monitoring chan.  │
//! └──────────────┘    └──────────────────────┘    └───────────────────┘
//! ```
//!
//! - [`failure`] - failure kinds, lineage and the stock [`Failure`] carrier
//! - [`rules`] - ordered first-match substring rules
//! - [`severity`] - severity levels
//! - [`channel`] - output sinks, backed by `tracing` or memory
//! - [`classifier`] - the cached resolve-then-emit pipeline

pub mod channel;
pub mod classifier;
pub mod failure;
pub mod rules;
pub mod severity;

pub use channel::{
    CapturedRecord, Channel, MemoryChannel, Record, TracingChannel, APPLICATION_TARGET,
    MONITORING_TARGET,
};
pub use classifier::{format_message, Classification, ClassifierStats, FailureClassifier};
pub use failure::{kinds, render_chain, Classifiable, Failure, FailureKind};
pub use rules::RuleSet;
pub use severity::Severity;
