//! Typed error hierarchy for the workflow.
//!
//! Three top-level enums cover the three subsystems:
//! - `StateError` — workflow state identity and persistence failures
//! - `PhaseError` — per-phase failures (every variant exits the phase with code 1)
//! - `ConfigError` — startup configuration failures

use std::path::PathBuf;

use thiserror::Error;

use crate::agent::AgentFailure;

/// Errors from the workflow state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(
        "Workflow {run_id} belongs to issue {existing}, refusing to reuse it for issue {requested}"
    )]
    IdentifierConflict {
        run_id: String,
        existing: String,
        requested: String,
    },

    #[error("No workflow state found for {run_id}")]
    StateNotFound { run_id: String },

    #[error("Invalid workflow identifier '{value}': expected 1-64 characters of [A-Za-z0-9_-]")]
    InvalidIdentifier { value: String },

    #[error("Failed to access state file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file at {path} records identifier {found}, not {expected}")]
    MismatchedIdentity {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("State file at {path} is not a valid workflow document: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from a single phase execution.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("Missing required state field '{field}'")]
    PreconditionMissing { field: String },

    #[error("Agent {label} failed: {failure}")]
    Agent { label: String, failure: AgentFailure },

    #[error("Agent {label} returned unusable output: {reason}")]
    InvalidAgentOutput { label: String, reason: String },

    #[error("{operation} failed: {message}")]
    CollaboratorFailure { operation: String, message: String },

    #[error("{phase} phase reported {failures} blocking failure(s)")]
    ChecksFailed { phase: String, failures: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PhaseError {
    pub fn precondition(field: &str) -> Self {
        PhaseError::PreconditionMissing {
            field: field.to_string(),
        }
    }

    pub fn invalid_output(label: &str, reason: impl Into<String>) -> Self {
        PhaseError::InvalidAgentOutput {
            label: label.to_string(),
            reason: reason.into(),
        }
    }

    pub fn collaborator(operation: &str, error: &anyhow::Error) -> Self {
        PhaseError::CollaboratorFailure {
            operation: operation.to_string(),
            message: format!("{:#}", error),
        }
    }

    /// Label used when reporting the failure as an issue comment.
    pub fn label(&self) -> &str {
        match self {
            PhaseError::Agent { label, .. } | PhaseError::InvalidAgentOutput { label, .. } => {
                label
            }
            _ => "ops",
        }
    }
}

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<String>),

    #[error("Invalid configuration in {path}: {message}")]
    InvalidFile { path: PathBuf, message: String },
}
