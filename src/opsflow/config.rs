// SPDX-License-Identifier: MIT

//! Engine configuration loaded from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::adk::error::OpsflowError;

pub const MAX_CONCURRENT_EXECUTIONS_VAR: &str = "OPSFLOW_MAX_CONCURRENT_EXECUTIONS";
pub const WORKFLOWS_DIR_VAR: &str = "OPSFLOW_WORKFLOWS_DIR";
pub const AGENT_URL_VAR: &str = "OPSFLOW_AGENT_URL";
pub const HTTP_TIMEOUT_VAR: &str = "OPSFLOW_HTTP_TIMEOUT_SECONDS";
pub const PORT_VAR: &str = "OPSFLOW_PORT";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Backpressure tokens for the HTTP execution endpoint
    pub max_concurrent_executions: usize,
    pub workflows_dir: PathBuf,
    /// Endpoint for `invoke_agent`; the handler is only registered when set
    pub agent_url: Option<String>,
    pub http_timeout_seconds: u64,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 8,
            workflows_dir: PathBuf::from("workflows"),
            agent_url: None,
            http_timeout_seconds: 30,
            port: 8080,
        }
    }
}

impl EngineConfig {
    /// Load from the process environment (call `dotenv` first to pick up `.env`)
    pub fn from_env() -> Result<Self, OpsflowError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OpsflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let config = Self {
            max_concurrent_executions: parse_or(
                MAX_CONCURRENT_EXECUTIONS_VAR,
                get(MAX_CONCURRENT_EXECUTIONS_VAR),
                defaults.max_concurrent_executions,
            )?,
            workflows_dir: get(WORKFLOWS_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or(defaults.workflows_dir),
            agent_url: get(AGENT_URL_VAR),
            http_timeout_seconds: parse_or(
                HTTP_TIMEOUT_VAR,
                get(HTTP_TIMEOUT_VAR),
                defaults.http_timeout_seconds,
            )?,
            port: parse_or(PORT_VAR, get(PORT_VAR), defaults.port)?,
        };

        if let Some(url) = &config.agent_url {
            url::Url::parse(url)
                .map_err(|e| OpsflowError::config(format!("{} is not a valid URL: {}", AGENT_URL_VAR, e)))?;
        }
        if config.max_concurrent_executions == 0 {
            return Err(OpsflowError::config(format!(
                "{} must be at least 1",
                MAX_CONCURRENT_EXECUTIONS_VAR
            )));
        }
        Ok(config)
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, OpsflowError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| OpsflowError::config(format!("{} has invalid value '{}'", key, raw))),
    }
}
