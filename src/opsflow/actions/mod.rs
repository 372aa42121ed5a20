// SPDX-License-Identifier: MIT

//! Built-in action handlers
//!
//! Each handler serves one leaf action tag. `builtin_handlers` builds the
//! default set from the engine configuration.

pub mod agent;
pub mod command;
pub mod flow;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use crate::adk::action::ActionHandler;
use crate::adk::error::OpsflowError;
use crate::opsflow::config::EngineConfig;

/// The default handler set. `invoke_agent` is only included when an agent
/// endpoint is configured.
pub fn builtin_handlers(config: &EngineConfig) -> Result<Vec<Arc<dyn ActionHandler>>, OpsflowError> {
    let timeout = Duration::from_secs(config.http_timeout_seconds);

    let http = http::HttpRequestHandler::new(timeout)
        .map_err(|e| OpsflowError::config(format!("failed to build HTTP client: {}", e)))?;

    let mut handlers: Vec<Arc<dyn ActionHandler>> = vec![
        Arc::new(command::RunCommandHandler),
        Arc::new(command::ExecuteCodeHandler),
        Arc::new(http),
        Arc::new(flow::WaitHandler),
        Arc::new(flow::TransformHandler),
        Arc::new(flow::ValidateHandler),
        Arc::new(flow::RouteHandler),
    ];

    match &config.agent_url {
        Some(url) => {
            let agent = agent::InvokeAgentHandler::new(url.clone(), timeout)
                .map_err(|e| OpsflowError::config(format!("failed to build agent client: {}", e)))?;
            handlers.push(Arc::new(agent));
        }
        None => log::warn!("OPSFLOW_AGENT_URL not set; invoke_agent steps will be rejected"),
    }

    Ok(handlers)
}
