// SPDX-License-Identifier: MIT

//! Workflow orchestration
//!
//! `WorkflowExecutor` validates a definition, drives it step by step
//! (sequential mode) or wave by wave (dependency-aware mode), owns the
//! execution state and aggregates the final `WorkflowResult`.

use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::adk::error::WorkflowError;
use crate::adk::hook::StepHook;
use crate::opsflow::workflow::context::ExecutionContext;
use crate::opsflow::workflow::graph::DependencyGraph;
use crate::opsflow::workflow::registry::ActionRegistry;
use crate::opsflow::workflow::result::{merge_outputs, StepResult, WorkflowResult, WorkflowStatus};
use crate::opsflow::workflow::state::{ExecutionState, INPUTS_KEY};
use crate::opsflow::workflow::step::{StepExecutor, StepRun};
use crate::opsflow::workflow::types::{ExecutionMode, WorkflowDefinition, WorkflowStep};

/// Runs one workflow definition against a handler table
pub struct WorkflowExecutor {
    definition: WorkflowDefinition,
    registry: ActionRegistry,
    hooks: Vec<Arc<dyn StepHook>>,
}

impl WorkflowExecutor {
    pub fn new(definition: WorkflowDefinition, registry: ActionRegistry) -> Self {
        Self {
            definition,
            registry,
            hooks: Vec::new(),
        }
    }

    /// Add a step hook; hooks run in the order they were added
    pub fn with_hook(mut self, hook: Arc<dyn StepHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn StepHook>>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Full construction-phase validation, including the handler table
    pub async fn validate(&self) -> Result<DependencyGraph, WorkflowError> {
        let graph = validate_definition(&self.definition)?;
        for step in scope_steps(&self.definition.steps) {
            let kind = step.kind();
            if !kind.is_branching() && !self.registry.contains(kind).await {
                return Err(WorkflowError::MissingHandler {
                    step: step.id.clone(),
                    action: kind,
                });
            }
        }
        Ok(graph)
    }

    /// Execute the workflow as a top-level call
    pub async fn execute(&self, inputs: Map<String, Value>) -> Result<WorkflowResult, WorkflowError> {
        self.execute_with_context(inputs, ExecutionContext::new()).await
    }

    /// Execute the workflow within an existing call chain.
    ///
    /// Only construction-time fatals are returned as `Err`; every step
    /// failure is reported inside the `WorkflowResult`.
    pub async fn execute_with_context(
        &self,
        inputs: Map<String, Value>,
        ctx: ExecutionContext,
    ) -> Result<WorkflowResult, WorkflowError> {
        let graph = self.validate().await?;

        let execution_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let started = Instant::now();
        let config = &self.definition.execution;

        log::info!(
            "Starting workflow '{}' v{} ({}): {} steps, mode {:?}, depth {}",
            self.definition.name,
            self.definition.version,
            execution_id,
            self.definition.steps.len(),
            config.mode,
            ctx.depth()
        );

        let steps = StepExecutor::new(self.registry.clone(), self.hooks.clone(), config.clone());
        let mut trace = Trace::new(inputs);

        match config.mode {
            ExecutionMode::Sequential => self.run_sequential(&steps, &mut trace, &ctx).await?,
            ExecutionMode::DependencyAware => self.run_waves(&steps, &graph, &mut trace, &ctx).await?,
        }

        let status = WorkflowStatus::from_results(&trace.step_results);
        let result = WorkflowResult {
            execution_id,
            workflow: self.definition.name.clone(),
            status,
            outputs: merge_outputs(&trace.step_results),
            steps_executed: trace.steps_executed,
            step_results: trace.step_results,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            cancelled: trace.cancelled,
        };

        log::info!(
            "Workflow '{}' finished with status {} in {}ms ({} steps executed)",
            result.workflow,
            result.status,
            result.duration_ms,
            result.steps_executed.len()
        );
        Ok(result)
    }

    async fn run_sequential(
        &self,
        steps: &StepExecutor,
        trace: &mut Trace,
        ctx: &ExecutionContext,
    ) -> Result<(), WorkflowError> {
        let stops_on_failure = self.definition.execution.stops_on_failure();

        for (index, step) in self.definition.steps.iter().enumerate() {
            if ctx.is_cancelled() {
                log::warn!(
                    "Execution cancelled; {} steps not started",
                    self.definition.steps.len() - index
                );
                trace.cancelled = true;
                break;
            }

            let run = steps.run(step, &trace.state, ctx).await?;
            if trace.record(run) && stops_on_failure {
                log::warn!("Step '{}' failed; stopping workflow '{}'", step.id, self.definition.name);
                break;
            }
        }
        Ok(())
    }

    async fn run_waves(
        &self,
        steps: &StepExecutor,
        graph: &DependencyGraph,
        trace: &mut Trace,
        ctx: &ExecutionContext,
    ) -> Result<(), WorkflowError> {
        let stops_on_failure = self.definition.execution.stops_on_failure();
        let by_id: HashMap<&str, &WorkflowStep> = self
            .definition
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();

        let waves = graph.parallel_groups();
        for (index, wave) in waves.iter().enumerate() {
            if ctx.is_cancelled() {
                log::warn!("Execution cancelled; {} waves not started", waves.len() - index);
                trace.cancelled = true;
                break;
            }

            let wave_steps: Vec<WorkflowStep> = wave
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).map(|s| (*s).clone()))
                .collect();
            log::info!(
                "Wave {}/{}: {} step(s) [{}]",
                index + 1,
                waves.len(),
                wave_steps.len(),
                wave.join(", ")
            );

            let runs = match wave_steps.as_slice() {
                [single] => vec![steps.run(single, &trace.state, ctx).await?],
                _ => steps.run_concurrently(&wave_steps, &trace.state, ctx).await?,
            };

            let mut wave_failed = false;
            for run in runs {
                wave_failed |= trace.record(run);
            }
            if wave_failed && stops_on_failure {
                log::warn!(
                    "Wave {} had failures; stopping workflow '{}'",
                    index + 1,
                    self.definition.name
                );
                break;
            }
        }
        Ok(())
    }
}

/// Orchestrator-owned record of one execution
struct Trace {
    state: ExecutionState,
    steps_executed: Vec<String>,
    step_results: Vec<StepResult>,
    cancelled: bool,
}

impl Trace {
    fn new(inputs: Map<String, Value>) -> Self {
        Self {
            state: ExecutionState::new(inputs),
            steps_executed: Vec::new(),
            step_results: Vec::new(),
            cancelled: false,
        }
    }

    /// Record a step and its nested steps; true if the step itself failed
    fn record(&mut self, run: StepRun) -> bool {
        let failed = run.result.is_failed();
        for result in run.into_results() {
            if result.is_success() {
                self.state.record(&result.step_id, result.outputs.clone());
            }
            self.steps_executed.push(result.step_id.clone());
            self.step_results.push(result);
        }
        failed
    }
}

/// Structural validation that needs no handler table.
///
/// Checks id uniqueness across the definition and its nested conditional
/// and group steps, retry and timeout values, the parallel limit and the
/// dependency graph. Sub-workflows are checked when they are entered.
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<DependencyGraph, WorkflowError> {
    if definition.execution.parallel_limit == 0 {
        return Err(WorkflowError::InvalidDefinition(
            "parallel_limit must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for step in scope_steps(&definition.steps) {
        if step.id == INPUTS_KEY {
            return Err(WorkflowError::InvalidDefinition(format!(
                "step id '{}' is reserved for the workflow inputs",
                INPUTS_KEY
            )));
        }
        if !seen.insert(step.id.as_str()) {
            return Err(WorkflowError::DuplicateStepId(step.id.clone()));
        }
        if step.retry.max_attempts == 0 {
            return Err(WorkflowError::InvalidDefinition(format!(
                "step '{}': retry.max_attempts must be at least 1",
                step.id
            )));
        }
        if !step.retry.delay_seconds.is_finite() || step.retry.delay_seconds < 0.0 {
            return Err(WorkflowError::InvalidDefinition(format!(
                "step '{}': retry.delay_seconds must be a non-negative number",
                step.id
            )));
        }
        if let Some(seconds) = step.timeout_seconds {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "step '{}': timeout_seconds must be positive",
                    step.id
                )));
            }
        }
    }

    DependencyGraph::build(&definition.steps)
}

/// Validate a definition and return its concurrency waves
pub fn plan(definition: &WorkflowDefinition) -> Result<Vec<Vec<String>>, WorkflowError> {
    Ok(validate_definition(definition)?.parallel_groups().to_vec())
}

/// Every step in one id scope, parents before their nested steps
fn scope_steps(steps: &[WorkflowStep]) -> Vec<&WorkflowStep> {
    let mut collected = Vec::new();
    for step in steps {
        collect_scope(step, &mut collected);
    }
    collected
}

fn collect_scope<'a>(step: &'a WorkflowStep, collected: &mut Vec<&'a WorkflowStep>) {
    collected.push(step);
    for child in step.action.nested_steps() {
        collect_scope(child, collected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::action::{ActionHandler, ActionOutputs, ActionRequest};
    use crate::adk::error::ActionError;
    use crate::opsflow::workflow::types::ActionKind;
    use async_trait::async_trait;
    use serde_json::json;

    /// Echoes resolved inputs back as outputs
    struct EchoHandler;

    #[async_trait]
    impl ActionHandler for EchoHandler {
        fn kind(&self) -> ActionKind {
            ActionKind::Transform
        }

        fn description(&self) -> &str {
            "Echo"
        }

        async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
            if request.input_str("fail").is_some() {
                return Err(ActionError::failed("asked to fail"));
            }
            Ok(request.inputs)
        }
    }

    async fn registry() -> ActionRegistry {
        let registry = ActionRegistry::new();
        registry.register(Arc::new(EchoHandler)).await;
        registry
    }

    fn parse(yaml: &str) -> WorkflowDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_threads_outputs() {
        let definition = parse(
            r#"
            name: seq
            steps:
              - id: a
                action: transform
                inputs:
                  greeting: "hello {{ inputs.name }}"
              - id: b
                action: transform
                inputs:
                  copied: "{{ a.greeting }}"
            "#,
        );
        let executor = WorkflowExecutor::new(definition, registry().await);
        let result = executor
            .execute(json!({"name": "ops"}).as_object().cloned().unwrap())
            .await
            .unwrap();

        assert_eq!(result.status, WorkflowStatus::Success);
        assert_eq!(result.steps_executed, vec!["a", "b"]);
        assert_eq!(result.outputs["copied"], json!("hello ops"));
        assert_eq!(result.workflow, "seq");
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_sequential_stops_on_first_failure_by_default() {
        let definition = parse(
            r#"
            name: stop
            steps:
              - id: a
                action: transform
                inputs: { fail: "yes" }
              - id: b
                action: transform
            "#,
        );
        let result = WorkflowExecutor::new(definition, registry().await)
            .execute(Map::new())
            .await
            .unwrap();
        assert_eq!(result.status, WorkflowStatus::Failed);
        assert_eq!(result.steps_executed, vec!["a"]);
    }

    #[tokio::test]
    async fn test_nested_results_are_recorded_before_parent() {
        let definition = parse(
            r#"
            name: nested
            steps:
              - id: gate
                action: conditional
                expression: "true"
                then_steps:
                  - id: inner
                    action: transform
                    inputs: { v: "1" }
              - id: after
                action: transform
                inputs:
                  seen: "{{ inner.v }}"
            "#,
        );
        let result = WorkflowExecutor::new(definition, registry().await)
            .execute(Map::new())
            .await
            .unwrap();
        assert_eq!(result.steps_executed, vec!["inner", "gate", "after"]);
        assert_eq!(result.step_results.len(), result.steps_executed.len());
        assert_eq!(result.outputs["seen"], json!("1"));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let duplicate_nested = parse(
            r#"
            name: dup
            steps:
              - id: a
                action: transform
              - id: g
                action: parallel_group
                steps:
                  - id: a
                    action: transform
            "#,
        );
        assert!(matches!(
            validate_definition(&duplicate_nested),
            Err(WorkflowError::DuplicateStepId(id)) if id == "a"
        ));

        let zero_attempts = parse(
            r#"
            name: zero
            steps:
              - id: a
                action: transform
                retry: { max_attempts: 0 }
            "#,
        );
        assert!(matches!(
            validate_definition(&zero_attempts),
            Err(WorkflowError::InvalidDefinition(_))
        ));

        let reserved_nested = parse(
            r#"
            name: reserved
            steps:
              - id: check
                action: conditional
                expression: "true"
                then_steps:
                  - id: inputs
                    action: transform
            "#,
        );
        assert!(matches!(
            validate_definition(&reserved_nested),
            Err(WorkflowError::InvalidDefinition(msg)) if msg.contains("reserved")
        ));

        let zero_limit = parse(
            r#"
            name: limit
            execution: { parallel_limit: 0 }
            steps: []
            "#,
        );
        assert!(matches!(
            validate_definition(&zero_limit),
            Err(WorkflowError::InvalidDefinition(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_handler_rejected_before_running() {
        let definition = parse(
            r#"
            name: missing
            steps:
              - id: a
                action: transform
              - id: call
                action: http_request
                url: http://localhost/
            "#,
        );
        let result = WorkflowExecutor::new(definition, registry().await)
            .execute(Map::new())
            .await;
        assert!(matches!(
            result,
            Err(WorkflowError::MissingHandler { action: ActionKind::HttpRequest, .. })
        ));
    }

    #[test]
    fn test_plan_returns_waves() {
        let definition = parse(
            r#"
            name: plan
            execution: { mode: dependency_aware }
            steps:
              - id: a
                action: transform
              - id: b
                action: transform
              - id: c
                action: transform
                depends_on: [a, b]
            "#,
        );
        let waves = plan(&definition).unwrap();
        assert_eq!(waves, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_issues_nothing() {
        let definition = parse(
            r#"
            name: cancelled
            steps:
              - id: a
                action: transform
            "#,
        );
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let result = WorkflowExecutor::new(definition, registry().await)
            .execute_with_context(Map::new(), ExecutionContext::with_cancellation(token))
            .await
            .unwrap();
        assert!(result.cancelled);
        assert!(result.steps_executed.is_empty());
    }
}
