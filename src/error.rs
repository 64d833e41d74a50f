//! Error types for faultmap

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building caches, classifiers and configuration.
///
/// Resolution never produces one of these: a failure that matches no rule
/// falls back to the configured defaults.
#[derive(Error, Debug)]
pub enum Error {
    /// Severity literal not recognised
    #[error("Unsupported severity: {0}")]
    InvalidSeverity(String),

    /// Default severity explicitly set to null
    #[error("Default severity must not be null")]
    MissingDefaultSeverity,

    /// Cache capacity of zero
    #[error("Invalid capacity {capacity} for {name}: must be at least 1")]
    InvalidCapacity { name: String, capacity: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error
    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Regular expression compile error
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::InvalidSeverity("fatal".into()).to_string(),
            "Unsupported severity: fatal"
        );
        assert_eq!(
            Error::InvalidCapacity {
                name: "code cache".into(),
                capacity: 0
            }
            .to_string(),
            "Invalid capacity 0 for code cache: must be at least 1"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "rules.yaml");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
