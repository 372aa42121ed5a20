// SPDX-License-Identifier: MIT

//! Typed error handling for opsflow-rs
//!
//! Errors are split by how far they are allowed to travel:
//! - `WorkflowError` is fatal and may escape `WorkflowExecutor::execute`
//! - `ExpressionError` and `ActionError` are recovered at the step boundary
//!   and turned into a failed `StepResult`

use thiserror::Error;

use crate::opsflow::workflow::types::ActionKind;

/// Top-level error type for the CLI and server surfaces
#[derive(Debug, Error)]
pub enum OpsflowError {
    /// Workflow construction or loading errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Configuration errors (invalid env vars, missing settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Fatal workflow errors, raised before the affected scope starts executing
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Circular dependency detected in the dependency graph
    #[error("Circular dependency detected: {0:?}")]
    CircularDependency(Vec<String>),

    /// A step depends on an id that does not exist
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// Two steps share the same id within one scope
    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    /// No handler is registered for a step's action
    #[error("No handler registered for action '{action}' (step '{step}')")]
    MissingHandler { step: String, action: ActionKind },

    /// Sub-workflow nesting went past the ceiling
    #[error("Sub-workflow nesting depth {depth} exceeds limit of {limit}")]
    NestingDepthExceeded { depth: usize, limit: usize },

    /// Structurally invalid definition (zero attempts, zero parallel limit, ...)
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// File not found when loading a workflow
    #[error("Workflow file not found: {0}")]
    FileNotFound(String),

    /// I/O errors while loading
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Expression parsing and resolution errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Could not parse expression '{0}'")]
    Parse(String),

    #[error("Unresolved reference '{0}'")]
    UnresolvedReference(String),

    #[error("Unterminated template in '{0}'")]
    UnterminatedTemplate(String),
}

/// Errors returned by action handlers
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action ran and reported failure
    #[error("{0}")]
    Failed(String),

    /// The resolved inputs or action fields are unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The attempt ran past its per-attempt ceiling
    #[error("Timed out after {seconds}s")]
    TimedOut { seconds: f64 },

    /// A pre-step hook refused the dispatch
    #[error("Aborted by hook: {0}")]
    HookAborted(String),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// I/O errors (process spawning etc.)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ActionError {
    /// Create a failure error
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl OpsflowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for OpsflowError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for OpsflowError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<ExpressionError> for ActionError {
    fn from(err: ExpressionError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
