// SPDX-License-Identifier: MIT

//! In-process actions: wait, transform, validate and route

use crate::adk::action::{ActionHandler, ActionOutputs, ActionRequest};
use crate::adk::error::ActionError;
use crate::opsflow::workflow::expression::evaluate_condition;
use crate::opsflow::workflow::types::{ActionKind, StepAction};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

pub struct WaitHandler;

#[async_trait]
impl ActionHandler for WaitHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Wait
    }

    fn description(&self) -> &str {
        "Pauses for a fixed number of seconds."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        let StepAction::Wait { seconds } = request.action else {
            return Err(ActionError::invalid_input("expected a wait step"));
        };
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|_| ActionError::invalid_input(format!("invalid wait of {} seconds", seconds)))?;

        if request.dry_run {
            log::info!("[dry run] would wait {}s", seconds);
        } else {
            tokio::time::sleep(duration).await;
        }

        let mut out = ActionOutputs::new();
        out.insert("waited_seconds".to_string(), json!(seconds));
        Ok(out)
    }
}

/// Passes resolved inputs through as outputs
pub struct TransformHandler;

#[async_trait]
impl ActionHandler for TransformHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Transform
    }

    fn description(&self) -> &str {
        "Reshapes data: the resolved inputs become the step outputs."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        Ok(request.inputs)
    }
}

/// Checks required inputs and rule conditions against the resolved inputs
pub struct ValidateHandler;

#[async_trait]
impl ActionHandler for ValidateHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Validate
    }

    fn description(&self) -> &str {
        "Validates resolved inputs against required keys and rule expressions."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        let StepAction::Validate { required, rules } = &request.action else {
            return Err(ActionError::invalid_input("expected a validate step"));
        };

        let mut violations = Vec::new();
        for key in required {
            match request.input(key) {
                None | Some(Value::Null) => violations.push(format!("missing required input '{}'", key)),
                Some(_) => {}
            }
        }
        for rule in rules {
            if !evaluate_condition(rule, &request.inputs)? {
                violations.push(format!("rule failed: {}", rule));
            }
        }

        if !violations.is_empty() {
            return Err(ActionError::failed(format!(
                "Validation failed: {}",
                violations.join("; ")
            )));
        }

        let mut out = ActionOutputs::new();
        out.insert("valid".to_string(), json!(true));
        Ok(out)
    }
}

/// Picks the first route whose `when` holds against the resolved inputs
pub struct RouteHandler;

#[async_trait]
impl ActionHandler for RouteHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Route
    }

    fn description(&self) -> &str {
        "Selects a route target from ordered conditions."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        let StepAction::Route { routes, default } = &request.action else {
            return Err(ActionError::invalid_input("expected a route step"));
        };

        let mut target = None;
        for route in routes {
            if evaluate_condition(&route.when, &request.inputs)? {
                target = Some(route.target.clone());
                break;
            }
        }

        let target = target
            .or_else(|| default.clone())
            .ok_or_else(|| ActionError::failed("No route matched and no default is set"))?;
        log::debug!("Step '{}' routed to '{}'", request.step_id, target);

        let mut out = ActionOutputs::new();
        out.insert("route".to_string(), json!(target));
        Ok(out)
    }
}
