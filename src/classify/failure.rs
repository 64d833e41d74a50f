//! Failure Model
//!
//! A failure is plain data: a message, a [`FailureKind`] naming its type and
//! lineage, an optional explicit code and an optional cause. Nothing here
//! unwinds; classification only reads these fields.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Type identity of a failure together with its precomputed lineage
///
/// The lineage lists the kind's own name first, then each supertype. The
/// universal root is implicit and never listed.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FailureKind {
    lineage: Arc<[Cow<'static, str>]>,
}

impl FailureKind {
    /// Kind directly under the universal root
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            lineage: Arc::from(vec![name.into()]),
        }
    }

    /// Subtype of `self` named `name`
    pub fn extend(&self, name: impl Into<Cow<'static, str>>) -> Self {
        let mut lineage = Vec::with_capacity(self.lineage.len() + 1);
        lineage.push(name.into());
        lineage.extend(self.lineage.iter().cloned());
        Self {
            lineage: Arc::from(lineage),
        }
    }

    /// Qualified name of the concrete type
    pub fn name(&self) -> &str {
        &self.lineage[0]
    }

    /// Names from the concrete type up to the last supertype
    pub fn ancestry(&self) -> impl Iterator<Item = &str> + '_ {
        self.lineage.iter().map(|name| name.as_ref())
    }

    /// Number of named types in the lineage
    pub fn depth(&self) -> usize {
        self.lineage.len()
    }

    /// Check if `name` appears anywhere in the lineage
    pub fn is_a(&self, name: &str) -> bool {
        self.ancestry().any(|n| n == name)
    }
}

impl fmt::Debug for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ancestry()).finish()
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything the classifier can map to a code and severity
///
/// The message is the `Display` output; the full context is the `source()`
/// chain.
pub trait Classifiable: StdError {
    /// Type identity and lineage
    fn kind(&self) -> &FailureKind;

    /// Code carried by the failure itself, bypassing rule lookup
    fn code(&self) -> Option<&str> {
        None
    }
}

/// Stock failure carrier
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Failure {
    kind: FailureKind,
    message: String,
    code: Option<String>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Failure {
    /// Create a failure of `kind`
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Attach an explicit code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Classifiable for Failure {
    fn kind(&self) -> &FailureKind {
        &self.kind
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Render a failure with its kind and every cause, one per line
pub fn render_chain(failure: &dyn Classifiable) -> String {
    let mut rendered = format!("{}: {}", failure.kind(), failure);
    let mut cause = failure.source();
    while let Some(err) = cause {
        rendered.push_str("\nCaused by: ");
        rendered.push_str(&err.to_string());
        cause = err.source();
    }
    rendered
}

// =============================================================================
// Built-in kinds
// =============================================================================

/// Commonly used failure kinds
pub mod kinds {
    use once_cell::sync::Lazy;

    use super::FailureKind;

    /// Unchecked failure raised by faulty program logic
    pub static RUNTIME: Lazy<FailureKind> =
        Lazy::new(|| FailureKind::new("faultmap.RuntimeFailure"));

    /// Argument outside the accepted domain
    pub static ILLEGAL_ARGUMENT: Lazy<FailureKind> =
        Lazy::new(|| RUNTIME.extend("faultmap.IllegalArgumentFailure"));

    /// Required value was absent
    pub static NULL_VALUE: Lazy<FailureKind> =
        Lazy::new(|| RUNTIME.extend("faultmap.NullValueFailure"));

    /// Operation invoked in the wrong state
    pub static ILLEGAL_STATE: Lazy<FailureKind> =
        Lazy::new(|| RUNTIME.extend("faultmap.IllegalStateFailure"));

    /// Operation not supported
    pub static UNSUPPORTED: Lazy<FailureKind> =
        Lazy::new(|| RUNTIME.extend("faultmap.UnsupportedOperationFailure"));

    /// Input/output failure
    pub static IO: Lazy<FailureKind> = Lazy::new(|| FailureKind::new("faultmap.io.IoFailure"));

    /// File could not be found
    pub static FILE_NOT_FOUND: Lazy<FailureKind> =
        Lazy::new(|| IO.extend("faultmap.io.FileNotFoundFailure"));
}
