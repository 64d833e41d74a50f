//! faultmap CLI
//!
//! Loads a classifier configuration and classifies failures from the
//! command line.
//!
//! ```text
//! faultmap --config rules.yaml check
//! faultmap --config rules.yaml classify --kind app.DuplicateKey \
//!     --extends app.DataFailure --message "order 42 exists"
//! ```
//!
//! Classified failures are logged through the `faultmap::application` and
//! `faultmap::monitoring` tracing targets; the JSON result goes to stdout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use faultmap::{Classifiable, ClassifierConfig, Failure, FailureClassifier, FailureKind};

// =============================================================================
// CLI Arguments
// =============================================================================

/// faultmap - rule-driven failure classification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Classifier configuration file (YAML); built-in defaults when omitted
    #[arg(long, env = "FAULTMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and print a summary
    Check,

    /// Classify one failure and log it
    Classify {
        /// Qualified name of the failure type
        #[arg(long)]
        kind: String,

        /// Supertypes, nearest first
        #[arg(long)]
        extends: Vec<String>,

        /// Explicit code, bypassing the code rules
        #[arg(long)]
        code: Option<String>,

        /// Failure message
        #[arg(long)]
        message: String,
    },
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = match &args.config {
        Some(path) => ClassifierConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClassifierConfig::default(),
    };
    let classifier = FailureClassifier::with_tracing(&config).context("invalid configuration")?;

    match args.command {
        Command::Check => {
            info!(
                code_rules = classifier.code_rules().len(),
                severity_rules = classifier.severity_rules().len(),
                "Configuration is valid"
            );
            let summary = json!({
                "code_rules": classifier.code_rules().len(),
                "severity_rules": classifier.severity_rules().len(),
                "default_code": classifier.default_code(),
                "default_severity": classifier.default_severity(),
                "code_cache_capacity": config.code_cache_capacity,
                "severity_cache_capacity": config.severity_cache_capacity,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Classify {
            kind,
            extends,
            code,
            message,
        } => {
            let mut failure = Failure::new(build_kind(kind, extends), message);
            if let Some(code) = code {
                failure = failure.with_code(code);
            }

            let classification = classifier.classify(&failure);
            classifier.log(&failure);

            let output = json!({
                "kind": failure.kind().name(),
                "lineage": failure.kind().ancestry().collect::<Vec<_>>(),
                "code": classification.code,
                "severity": classification.severity,
                "message": faultmap::classify::format_message(
                    classification.code.as_deref(),
                    failure.message(),
                ),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Build a kind from its name and supertypes listed nearest first
fn build_kind(name: String, extends: Vec<String>) -> FailureKind {
    let mut supertypes = extends.into_iter().rev();
    match supertypes.next() {
        Some(root) => supertypes
            .fold(FailureKind::new(root), |kind, parent| kind.extend(parent))
            .extend(name),
        None => FailureKind::new(name),
    }
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
