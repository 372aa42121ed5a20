// SPDX-License-Identifier: MIT

use crate::adk::action::{ActionHandler, ActionOutputs, ActionRequest};
use crate::adk::error::ActionError;
use crate::opsflow::workflow::types::{ActionKind, StepAction};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct AgentInvocation<'a> {
    pub agent: &'a str,
    pub prompt: Option<&'a str>,
    pub inputs: &'a Map<String, Value>,
}

/// Forwards `invoke_agent` steps to an external agent service
pub struct InvokeAgentHandler {
    client: Client,
    endpoint: String,
}

impl InvokeAgentHandler {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ActionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ActionHandler for InvokeAgentHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::InvokeAgent
    }

    fn description(&self) -> &str {
        "Invokes a named agent through the configured agent service."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        let StepAction::InvokeAgent { agent, prompt } = &request.action else {
            return Err(ActionError::invalid_input("expected an invoke_agent step"));
        };

        // A resolved `prompt` input wins over the static one
        let prompt = request.input_str("prompt").or(prompt.as_deref());
        let invocation = AgentInvocation {
            agent,
            prompt,
            inputs: &request.inputs,
        };

        if request.dry_run {
            log::info!("[dry run] would invoke agent '{}'", agent);
            let mut out = ActionOutputs::new();
            out.insert("dry_run".to_string(), json!(true));
            out.insert("agent".to_string(), json!(agent));
            return Ok(out);
        }

        log::info!("Invoking agent '{}' via {}", agent, self.endpoint);
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&invocation)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(ActionError::failed(format!(
                "Agent service error ({}): {}",
                status.as_u16(),
                text
            )));
        }

        let body: Value = resp.json().await?;
        match body {
            Value::Object(map) => Ok(map),
            other => {
                let mut out = ActionOutputs::new();
                out.insert("response".to_string(), other);
                Ok(out)
            }
        }
    }
}
