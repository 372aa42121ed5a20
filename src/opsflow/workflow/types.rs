// SPDX-License-Identifier: MIT

//! Schema types for workflow definitions
//!
//! This module contains all the data structures used for parsing
//! workflow YAML/JSON documents.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// How the orchestrator drives the step list
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Declaration order, one step at a time (default)
    #[default]
    Sequential,
    /// Concurrency waves computed from `depends_on`
    #[serde(alias = "dependency-aware", alias = "parallel")]
    DependencyAware,
}

/// Execution policy for one workflow
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default = "default_parallel_limit")]
    pub parallel_limit: usize,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_parallel_limit() -> usize {
    5
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            fail_fast: false,
            continue_on_error: false,
            parallel_limit: default_parallel_limit(),
            dry_run: false,
        }
    }
}

impl ExecutionConfig {
    /// Whether a failure should stop the run.
    ///
    /// Only `continue_on_error` without `fail_fast` keeps going.
    pub fn stops_on_failure(&self) -> bool {
        self.fail_fast || !self.continue_on_error
    }
}

/// A single step in a workflow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowStep {
    /// Unique identifier within the definition
    pub id: String,
    /// Action tag plus its action-specific fields
    #[serde(flatten)]
    pub action: StepAction,
    /// Parameter name -> expression string
    #[serde(default)]
    pub inputs: HashMap<String, String>,
    /// Skip the step when this evaluates to false
    #[serde(default)]
    pub condition: Option<String>,
    /// Steps that must complete before this one (dependency-aware mode)
    #[serde(default)]
    pub depends_on: DependsOn,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Per-attempt wall-clock ceiling
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: id.into(),
            action,
            inputs: HashMap::new(),
            condition: None,
            depends_on: DependsOn::None,
            retry: RetryPolicy::default(),
            timeout_seconds: None,
        }
    }

    pub fn with_depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = DependsOn::Multiple(deps.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, expr: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), expr.into());
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, delay_seconds: f64) -> Self {
        self.retry = RetryPolicy {
            max_attempts,
            delay_seconds,
        };
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }
}

/// Retry policy for a step
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub delay_seconds: f64,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_seconds: 0.0,
        }
    }
}

/// Dependency specification (single string or array)
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(untagged)]
pub enum DependsOn {
    /// No dependencies
    #[default]
    None,
    /// Single dependency
    Single(String),
    /// Multiple dependencies
    Multiple(Vec<String>),
}

impl DependsOn {
    /// Convert to a vector of dependency IDs
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            DependsOn::None => vec![],
            DependsOn::Single(s) => vec![s.clone()],
            DependsOn::Multiple(v) => v.clone(),
        }
    }

    /// Check if there are no dependencies
    pub fn is_empty(&self) -> bool {
        match self {
            DependsOn::None => true,
            DependsOn::Single(_) => false,
            DependsOn::Multiple(v) => v.is_empty(),
        }
    }
}

/// A conditional route used by the `route` action
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Route {
    pub when: String,
    pub target: String,
}

/// The action a step performs, tagged by `action`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    InvokeAgent {
        agent: String,
        #[serde(default)]
        prompt: Option<String>,
    },
    RunCommand {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        working_dir: Option<String>,
    },
    Validate {
        #[serde(default)]
        required: Vec<String>,
        #[serde(default)]
        rules: Vec<String>,
    },
    Transform {},
    Conditional {
        expression: String,
        #[serde(default)]
        then_steps: Vec<WorkflowStep>,
        #[serde(default)]
        else_steps: Vec<WorkflowStep>,
    },
    ParallelGroup {
        #[serde(default)]
        steps: Vec<WorkflowStep>,
    },
    Wait {
        seconds: f64,
    },
    ExecuteCode {
        language: String,
        code: String,
    },
    HttpRequest {
        #[serde(default = "default_method")]
        method: String,
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<serde_json::Value>,
    },
    SubWorkflow {
        workflow: Box<WorkflowDefinition>,
    },
    Route {
        #[serde(default)]
        routes: Vec<Route>,
        #[serde(default)]
        default: Option<String>,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

/// Fieldless action tag, used to key the handler table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    InvokeAgent,
    RunCommand,
    Validate,
    Transform,
    Conditional,
    ParallelGroup,
    Wait,
    ExecuteCode,
    HttpRequest,
    SubWorkflow,
    Route,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::InvokeAgent => "invoke_agent",
            ActionKind::RunCommand => "run_command",
            ActionKind::Validate => "validate",
            ActionKind::Transform => "transform",
            ActionKind::Conditional => "conditional",
            ActionKind::ParallelGroup => "parallel_group",
            ActionKind::Wait => "wait",
            ActionKind::ExecuteCode => "execute_code",
            ActionKind::HttpRequest => "http_request",
            ActionKind::SubWorkflow => "sub_workflow",
            ActionKind::Route => "route",
        }
    }

    /// Branching actions are run by the engine, not by a handler
    pub fn is_branching(&self) -> bool {
        matches!(
            self,
            ActionKind::Conditional | ActionKind::ParallelGroup | ActionKind::SubWorkflow
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StepAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            StepAction::InvokeAgent { .. } => ActionKind::InvokeAgent,
            StepAction::RunCommand { .. } => ActionKind::RunCommand,
            StepAction::Validate { .. } => ActionKind::Validate,
            StepAction::Transform {} => ActionKind::Transform,
            StepAction::Conditional { .. } => ActionKind::Conditional,
            StepAction::ParallelGroup { .. } => ActionKind::ParallelGroup,
            StepAction::Wait { .. } => ActionKind::Wait,
            StepAction::ExecuteCode { .. } => ActionKind::ExecuteCode,
            StepAction::HttpRequest { .. } => ActionKind::HttpRequest,
            StepAction::SubWorkflow { .. } => ActionKind::SubWorkflow,
            StepAction::Route { .. } => ActionKind::Route,
        }
    }

    /// Steps nested directly inside this action that share the parent's id scope
    pub fn nested_steps(&self) -> Vec<&WorkflowStep> {
        match self {
            StepAction::Conditional {
                then_steps,
                else_steps,
                ..
            } => then_steps.iter().chain(else_steps.iter()).collect(),
            StepAction::ParallelGroup { steps } => steps.iter().collect(),
            _ => vec![],
        }
    }
}
