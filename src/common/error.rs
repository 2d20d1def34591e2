//! Error types for steptree
//!
//! Step failures are ordinary values here: the walker captures them,
//! classifies them and keeps going. Only configuration and loading errors
//! ever reach the CLI.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for steptree
#[derive(Error, Debug)]
pub enum Error {
    // === Directive Errors ===
    #[error("Undefined directive: {0}")]
    UndefinedDirective(String),

    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    // === Step Errors ===
    #[error("Undefined step: {0}")]
    UndefinedStep(String),

    #[error("Soft failure: {0}")]
    SoftFailure(String),

    #[error("Step failed: {0}")]
    HardFailure(String),

    // === Catalog Errors ===
    #[error("Scenario lookup in [{paths}] failed: {reason}")]
    CatalogLookup { paths: String, reason: String },

    #[error("Invalid tag filter '{filter}': {reason}")]
    InvalidTagFilter { filter: String, reason: String },

    #[error("Invalid step metadata in '{step}': {reason}")]
    InvalidMetadata { step: String, reason: String },

    // === Run Errors ===
    #[error("{failed} of {total} scenario(s) failed")]
    ScenariosFailed { failed: usize, total: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Failed to parse feature file '{path}': {error}")]
    FeatureParse { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid expression error
    pub fn invalid_expression(expression: &str, reason: &str) -> Self {
        Self::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a catalog lookup error for a set of feature paths
    pub fn catalog_lookup<S: AsRef<str>>(paths: &[S], reason: &str) -> Self {
        Self::CatalogLookup {
            paths: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid tag filter error
    pub fn invalid_tag_filter(filter: &str, reason: &str) -> Self {
        Self::InvalidTagFilter {
            filter: filter.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid metadata error
    pub fn invalid_metadata(step: &str, reason: &str) -> Self {
        Self::InvalidMetadata {
            step: step.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is the designated recoverable failure kind.
    ///
    /// Everything else, undefined steps and directives included, counts as
    /// a hard failure.
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, Self::SoftFailure(_))
    }
}
