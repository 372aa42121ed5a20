// SPDX-License-Identifier: MIT

use crate::adk::action::{ActionHandler, ActionOutputs, ActionRequest};
use crate::adk::error::ActionError;
use crate::opsflow::workflow::types::{ActionKind, StepAction};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;

/// Performs `http_request` steps.
///
/// Resolved `url` and `body` inputs override the step's static fields. The
/// response body is returned parsed as JSON when possible, as text otherwise.
pub struct HttpRequestHandler {
    client: Client,
}

impl HttpRequestHandler {
    pub fn new(timeout: Duration) -> Result<Self, ActionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ActionHandler for HttpRequestHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::HttpRequest
    }

    fn description(&self) -> &str {
        "Sends an HTTP request and returns the status code and response body."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        let StepAction::HttpRequest {
            method,
            url,
            headers,
            body,
        } = &request.action
        else {
            return Err(ActionError::invalid_input("expected an http_request step"));
        };

        let url = request.input_str("url").unwrap_or(url);
        let parsed = url::Url::parse(url)
            .map_err(|e| ActionError::invalid_input(format!("invalid url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ActionError::invalid_input(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ActionError::invalid_input(format!("invalid HTTP method '{}'", method)))?;
        let body = request.input("body").cloned().or_else(|| body.clone());

        if request.dry_run {
            log::info!("[dry run] would send {} {}", method, parsed);
            let mut out = ActionOutputs::new();
            out.insert("dry_run".to_string(), json!(true));
            out.insert("method".to_string(), json!(method.as_str()));
            out.insert("url".to_string(), json!(parsed.as_str()));
            out.insert("body".to_string(), body.unwrap_or(Value::Null));
            return Ok(out);
        }

        let mut builder = self.client.request(method.clone(), parsed.as_str());
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match body {
            Some(Value::String(text)) => builder.body(text),
            Some(other) => builder.json(&other),
            None => builder,
        };

        log::debug!("Sending {} {}", method, parsed);
        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return Err(ActionError::failed(format!(
                "HTTP {} from {} {}",
                status.as_u16(),
                method,
                parsed
            )));
        }

        let mut out = ActionOutputs::new();
        out.insert("status".to_string(), json!(status.as_u16()));
        out.insert("body".to_string(), body);
        Ok(out)
    }
}
