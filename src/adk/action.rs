use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::adk::error::ActionError;
use crate::opsflow::workflow::types::{ActionKind, StepAction};

/// Output map produced by a successful dispatch
pub type ActionOutputs = Map<String, Value>;

/// Everything a handler receives for one dispatch attempt.
///
/// Handlers only see the step's declared action fields, its resolved inputs
/// and the dry-run flag. They never get access to execution state.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub step_id: String,
    pub action: StepAction,
    pub inputs: Map<String, Value>,
    pub dry_run: bool,
}

impl ActionRequest {
    /// Get a resolved input value
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    /// Get a resolved input as a string slice
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).and_then(|v| v.as_str())
    }
}

/// Trait for collaborators that carry out leaf actions.
///
/// One handler is registered per `ActionKind`. Branching actions
/// (conditional, parallel group, sub-workflow) are run by the engine itself
/// and never reach a handler.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action tag this handler serves
    fn kind(&self) -> ActionKind;

    /// Returns a human-readable description of what the handler does
    fn description(&self) -> &str;

    /// Execute one attempt and return the step outputs
    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError>;
}
