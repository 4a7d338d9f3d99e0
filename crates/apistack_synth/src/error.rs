//! Error types for synthesis.

use thiserror::Error;

use apistack_policy::ValidationReport;

use crate::graph::LogicalId;

/// Result type alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors that can occur while building or emitting a resource graph.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Stack validation failed: {0}")]
    Validation(ValidationReport),

    #[error("Duplicate logical id: {0}")]
    DuplicateId(LogicalId),

    #[error("Resource {from} references unknown resource {to}")]
    DanglingReference { from: LogicalId, to: LogicalId },

    #[error("Dependency cycle among: {0}")]
    Cycle(String),

    #[error("Graph invariant violated: {0}")]
    InvariantViolated(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Model error: {0}")]
    Model(#[from] apistack_model::ModelError),

    #[error("Policy error: {0}")]
    Policy(#[from] apistack_policy::PolicyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
