// SPDX-License-Identifier: MIT

//! Step hooks
//!
//! Hooks wrap step dispatch:
//! 1. `before_step()` runs after the condition passed and inputs resolved
//! 2. the step is dispatched (with retries) unless a hook aborted
//! 3. `after_step()` runs with the final result

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::opsflow::workflow::result::StepResult;
use crate::opsflow::workflow::types::WorkflowStep;

/// Decision returned by a pre-step hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Continue,
    Abort(String),
}

#[async_trait]
pub trait StepHook: Send + Sync {
    /// Called before the first dispatch attempt of a step.
    async fn before_step(&self, _step: &WorkflowStep, _inputs: &Map<String, Value>) -> HookDecision {
        HookDecision::Continue
    }

    /// Called once a step has a final result (including skips and aborts).
    async fn after_step(&self, _step: &WorkflowStep, _result: &StepResult) {}
}
