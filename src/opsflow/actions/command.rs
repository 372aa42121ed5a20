// SPDX-License-Identifier: MIT

use crate::adk::action::{ActionHandler, ActionOutputs, ActionRequest};
use crate::adk::error::ActionError;
use crate::opsflow::workflow::types::{ActionKind, StepAction};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Command;

/// Prefix for environment variables carrying resolved inputs
pub const INPUT_ENV_PREFIX: &str = "OPSFLOW_INPUT_";

/// Runs `run_command` steps as child processes
pub struct RunCommandHandler;

#[async_trait]
impl ActionHandler for RunCommandHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::RunCommand
    }

    fn description(&self) -> &str {
        "Runs a command with arguments. Resolved inputs are exported as OPSFLOW_INPUT_<NAME> environment variables."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        let StepAction::RunCommand {
            command,
            args,
            working_dir,
        } = &request.action
        else {
            return Err(ActionError::invalid_input("expected a run_command step"));
        };

        run_process(
            command,
            args,
            working_dir.as_deref(),
            &request.inputs,
            request.dry_run,
        )
        .await
    }
}

/// Runs `execute_code` steps through a language interpreter
pub struct ExecuteCodeHandler;

impl ExecuteCodeHandler {
    /// Interpreter and flag for a language name
    pub fn interpreter(language: &str) -> Option<(&'static str, &'static str)> {
        match language.to_ascii_lowercase().as_str() {
            "python" | "python3" => Some(("python3", "-c")),
            "javascript" | "js" | "node" => Some(("node", "-e")),
            "shell" | "bash" | "sh" => Some(("sh", "-c")),
            _ => None,
        }
    }
}

#[async_trait]
impl ActionHandler for ExecuteCodeHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::ExecuteCode
    }

    fn description(&self) -> &str {
        "Executes an inline python, javascript or shell snippet."
    }

    async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
        let StepAction::ExecuteCode { language, code } = &request.action else {
            return Err(ActionError::invalid_input("expected an execute_code step"));
        };

        let (program, flag) = Self::interpreter(language)
            .ok_or_else(|| ActionError::invalid_input(format!("unsupported language '{}'", language)))?;

        run_process(
            program,
            &[flag.to_string(), code.clone()],
            None,
            &request.inputs,
            request.dry_run,
        )
        .await
    }
}

async fn run_process(
    program: &str,
    args: &[String],
    working_dir: Option<&str>,
    inputs: &Map<String, Value>,
    dry_run: bool,
) -> Result<ActionOutputs, ActionError> {
    let command_line = std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");

    if dry_run {
        log::info!("[dry run] would run: {}", command_line);
        return Ok(outputs(json!({
            "dry_run": true,
            "command": command_line,
        })));
    }

    let mut cmd = Command::new(program);
    // A timed-out attempt drops this future; take the child down with it
    cmd.args(args).kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    for (name, value) in inputs {
        cmd.env(env_var_name(name), value_text(value));
    }

    log::debug!("Running: {}", command_line);
    let output = cmd.output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(ActionError::failed(format!(
            "'{}' exited with {}: {}",
            command_line,
            code,
            stderr.trim()
        )));
    }

    Ok(outputs(json!({
        "stdout": stdout,
        "stderr": stderr,
        "exit_code": output.status.code(),
    })))
}

/// `OPSFLOW_INPUT_` plus the upper-cased name, non-alphanumerics as `_`
pub fn env_var_name(input: &str) -> String {
    let suffix: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", INPUT_ENV_PREFIX, suffix)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn outputs(value: Value) -> ActionOutputs {
    match value {
        Value::Object(map) => map,
        _ => ActionOutputs::new(),
    }
}
