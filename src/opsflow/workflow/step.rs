// SPDX-License-Identifier: MIT

//! Single-step execution
//!
//! `StepExecutor` takes one step from its condition check to a final
//! `StepResult`. Leaf actions are dispatched through the handler table with
//! retry and timeout. Branching actions (conditional, parallel group,
//! sub-workflow) recurse back into the engine.
//!
//! The executor only reads execution state. Results flow back to the
//! orchestrator, which is the single writer.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::adk::action::{ActionHandler, ActionOutputs, ActionRequest};
use crate::adk::error::{ActionError, WorkflowError};
use crate::adk::hook::{HookDecision, StepHook};
use crate::opsflow::workflow::context::ExecutionContext;
use crate::opsflow::workflow::executor::WorkflowExecutor;
use crate::opsflow::workflow::expression;
use crate::opsflow::workflow::registry::ActionRegistry;
use crate::opsflow::workflow::result::{merge_outputs, StepResult, WorkflowStatus};
use crate::opsflow::workflow::state::ExecutionState;
use crate::opsflow::workflow::types::{ExecutionConfig, StepAction, WorkflowStep};

/// Result of running one step, plus the results of any nested steps it ran
/// in its own id scope (conditional branches, parallel groups).
#[derive(Debug, Clone)]
pub struct StepRun {
    pub result: StepResult,
    pub nested: Vec<StepResult>,
}

impl StepRun {
    fn single(result: StepResult) -> Self {
        Self {
            result,
            nested: Vec::new(),
        }
    }

    /// All results in recording order: nested steps first, then the step itself
    pub fn into_results(self) -> Vec<StepResult> {
        let mut results = self.nested;
        results.push(self.result);
        results
    }
}

/// What a branching action produced before it is turned into a result
struct BranchOutcome {
    outputs: Result<Map<String, Value>, String>,
    nested: Vec<StepResult>,
}

#[derive(Clone)]
pub struct StepExecutor {
    registry: ActionRegistry,
    hooks: Arc<Vec<Arc<dyn StepHook>>>,
    config: ExecutionConfig,
}

impl StepExecutor {
    pub fn new(registry: ActionRegistry, hooks: Vec<Arc<dyn StepHook>>, config: ExecutionConfig) -> Self {
        Self {
            registry,
            hooks: Arc::new(hooks),
            config,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run one step against a read-only view of the execution state.
    ///
    /// Step-level problems (expression errors, handler errors, timeouts,
    /// hook aborts) come back as a failed `StepResult`. Only fatal errors
    /// from nested scopes (depth ceiling, invalid sub-workflow) are `Err`.
    pub fn run<'a>(
        &'a self,
        step: &'a WorkflowStep,
        state: &'a ExecutionState,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<StepRun, WorkflowError>> {
        async move {
            let started = Instant::now();

            if let Some(condition) = &step.condition {
                match expression::evaluate_condition(condition, state) {
                    Ok(true) => {}
                    Ok(false) => {
                        log::info!("Skipping step '{}': condition '{}' is false", step.id, condition);
                        let result = StepResult::skipped(&step.id, elapsed_ms(started));
                        return Ok(self.complete(step, result).await);
                    }
                    Err(e) => {
                        log::warn!("Step '{}' condition could not be evaluated: {}", step.id, e);
                        let result = StepResult::failed(
                            &step.id,
                            format!("Condition error: {}", e),
                            elapsed_ms(started),
                            0,
                        );
                        return Ok(self.complete(step, result).await);
                    }
                }
            }

            let inputs = match expression::resolve_inputs(&step.inputs, state) {
                Ok(inputs) => inputs,
                Err(e) => {
                    log::warn!("Step '{}' inputs could not be resolved: {}", step.id, e);
                    let result =
                        StepResult::failed(&step.id, format!("Input error: {}", e), elapsed_ms(started), 0);
                    return Ok(self.complete(step, result).await);
                }
            };

            for hook in self.hooks.iter() {
                if let HookDecision::Abort(reason) = hook.before_step(step, &inputs).await {
                    log::warn!("Hook aborted step '{}': {}", step.id, reason);
                    let error = ActionError::HookAborted(reason);
                    let result = StepResult::failed(&step.id, error.to_string(), elapsed_ms(started), 0);
                    return Ok(self.complete(step, result).await);
                }
            }

            log::info!("Running step '{}' ({})", step.id, step.kind());
            let run = if step.kind().is_branching() {
                self.run_branch(step, inputs, state, ctx, started).await?
            } else {
                StepRun::single(self.run_leaf(step, inputs, ctx, started).await?)
            };

            log::info!(
                "Step '{}' finished: {:?} in {}ms ({} attempt(s))",
                step.id,
                run.result.status,
                run.result.duration_ms,
                run.result.attempts
            );

            for hook in self.hooks.iter() {
                hook.after_step(step, &run.result).await;
            }
            Ok(run)
        }
        .boxed()
    }

    /// Run a batch of steps concurrently against one snapshot of the state.
    ///
    /// At most `parallel_limit` run at once. Runs come back in submission
    /// order. A panicking task becomes a failed result for that step only.
    /// A fatal error from any step is returned after every task has joined.
    pub async fn run_concurrently(
        &self,
        steps: &[WorkflowStep],
        state: &ExecutionState,
        ctx: &ExecutionContext,
    ) -> Result<Vec<StepRun>, WorkflowError> {
        let semaphore = Arc::new(Semaphore::new(self.config.parallel_limit.max(1)));
        let snapshot = Arc::new(state.clone());

        let mut handles = Vec::with_capacity(steps.len());
        for step in steps {
            let executor = self.clone();
            let step = step.clone();
            let snapshot = snapshot.clone();
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            let step_id = step.id.clone();

            let handle = tokio::spawn(async move {
                let started = Instant::now();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return Ok(StepRun::single(StepResult::failed(&step.id, e.to_string(), 0, 0)));
                    }
                };
                if ctx.is_cancelled() {
                    log::warn!("Not starting step '{}': execution cancelled", step.id);
                    return Ok(StepRun::single(StepResult::failed(
                        &step.id,
                        "cancelled",
                        elapsed_ms(started),
                        0,
                    )));
                }
                executor.run(&step, &snapshot, &ctx).await
            });
            handles.push((step_id, handle));
        }

        let mut runs = Vec::with_capacity(handles.len());
        let mut fatal = None;
        for (step_id, handle) in handles {
            match handle.await {
                Ok(Ok(run)) => runs.push(run),
                Ok(Err(e)) => {
                    log::error!("Step '{}' raised a fatal error: {}", step_id, e);
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(join_error) => {
                    log::error!("Step '{}' task failed: {}", step_id, join_error);
                    runs.push(StepRun::single(StepResult::failed(
                        &step_id,
                        format!("Step task failed: {}", join_error),
                        0,
                        0,
                    )));
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(runs),
        }
    }

    async fn complete(&self, step: &WorkflowStep, result: StepResult) -> StepRun {
        for hook in self.hooks.iter() {
            hook.after_step(step, &result).await;
        }
        StepRun::single(result)
    }

    async fn run_leaf(
        &self,
        step: &WorkflowStep,
        inputs: Map<String, Value>,
        ctx: &ExecutionContext,
        started: Instant,
    ) -> Result<StepResult, WorkflowError> {
        let kind = step.kind();
        let handler = self
            .registry
            .get(kind)
            .await
            .ok_or_else(|| WorkflowError::MissingHandler {
                step: step.id.clone(),
                action: kind,
            })?;

        let max_attempts = step.retry.max_attempts.max(1);
        let delay = to_duration(step.retry.delay_seconds);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 && (ctx.is_cancelled() || !pause(delay, ctx).await) {
                log::warn!("Step '{}' cancelled before attempt {}", step.id, attempt);
                return Ok(StepResult::failed(
                    &step.id,
                    "cancelled",
                    elapsed_ms(started),
                    attempt - 1,
                ));
            }

            let request = ActionRequest {
                step_id: step.id.clone(),
                action: step.action.clone(),
                inputs: inputs.clone(),
                dry_run: self.config.dry_run,
            };

            match dispatch(handler.as_ref(), request, &step.id, step.timeout_seconds).await {
                Ok(outputs) => {
                    return Ok(StepResult::success(&step.id, outputs, elapsed_ms(started), attempt));
                }
                Err(e) => {
                    if attempt < max_attempts {
                        log::warn!(
                            "Step '{}' attempt {}/{} failed: {}; retrying in {:?}",
                            step.id,
                            attempt,
                            max_attempts,
                            e,
                            delay
                        );
                    } else {
                        log::error!("Step '{}' failed after {} attempt(s): {}", step.id, attempt, e);
                    }
                    last_error = e.to_string();
                }
            }
        }

        Ok(StepResult::failed(&step.id, last_error, elapsed_ms(started), max_attempts))
    }

    /// Branching actions get a single attempt; the timeout covers the whole branch
    async fn run_branch(
        &self,
        step: &WorkflowStep,
        inputs: Map<String, Value>,
        state: &ExecutionState,
        ctx: &ExecutionContext,
        started: Instant,
    ) -> Result<StepRun, WorkflowError> {
        let branch = self.branch(step, inputs, state, ctx);
        let outcome = match step.timeout_seconds {
            Some(seconds) => match tokio::time::timeout(to_duration(seconds), branch).await {
                Ok(outcome) => outcome?,
                Err(_) => {
                    log::warn!("Step '{}' timed out after {}s", step.id, seconds);
                    let error = ActionError::TimedOut { seconds };
                    return Ok(StepRun::single(StepResult::failed(
                        &step.id,
                        error.to_string(),
                        elapsed_ms(started),
                        1,
                    )));
                }
            },
            None => branch.await?,
        };

        let result = match outcome.outputs {
            Ok(outputs) => StepResult::success(&step.id, outputs, elapsed_ms(started), 1),
            Err(error) => StepResult::failed(&step.id, error, elapsed_ms(started), 1),
        };
        Ok(StepRun {
            result,
            nested: outcome.nested,
        })
    }

    async fn branch(
        &self,
        step: &WorkflowStep,
        inputs: Map<String, Value>,
        state: &ExecutionState,
        ctx: &ExecutionContext,
    ) -> Result<BranchOutcome, WorkflowError> {
        match &step.action {
            StepAction::Conditional {
                expression,
                then_steps,
                else_steps,
            } => {
                let take_then = match expression::evaluate_condition(expression, state) {
                    Ok(value) => value,
                    Err(e) => {
                        return Ok(BranchOutcome {
                            outputs: Err(format!("Expression error: {}", e)),
                            nested: Vec::new(),
                        });
                    }
                };
                let (branch, steps) = if take_then {
                    ("then", then_steps)
                } else {
                    ("else", else_steps)
                };
                log::info!(
                    "Conditional '{}' took the {} branch ({} steps)",
                    step.id,
                    branch,
                    steps.len()
                );

                let (nested, failures) = self.run_sequence(steps, state, ctx).await?;
                let outputs = if failures.is_empty() {
                    let mut outputs = merge_outputs(&nested);
                    outputs.insert("branch".to_string(), Value::String(branch.to_string()));
                    Ok(outputs)
                } else {
                    Err(format!("{} branch failed: {}", branch, failures.join(", ")))
                };
                Ok(BranchOutcome { outputs, nested })
            }
            StepAction::ParallelGroup { steps } => {
                log::info!(
                    "Parallel group '{}' starting {} steps (limit {})",
                    step.id,
                    steps.len(),
                    self.config.parallel_limit
                );
                let runs = self.run_concurrently(steps, state, ctx).await?;
                let failures: Vec<String> = runs
                    .iter()
                    .filter(|run| run.result.is_failed())
                    .map(|run| run.result.step_id.clone())
                    .collect();
                let nested: Vec<StepResult> = runs.into_iter().flat_map(StepRun::into_results).collect();
                let outputs = if failures.is_empty() {
                    Ok(merge_outputs(&nested))
                } else {
                    Err(format!(
                        "{} of {} grouped steps failed: {}",
                        failures.len(),
                        steps.len(),
                        failures.join(", ")
                    ))
                };
                Ok(BranchOutcome { outputs, nested })
            }
            StepAction::SubWorkflow { workflow } => {
                let child_ctx = ctx.enter_sub_workflow()?;
                log::info!(
                    "Entering sub-workflow '{}' from step '{}' (depth {})",
                    workflow.name,
                    step.id,
                    child_ctx.depth()
                );

                let mut definition = (**workflow).clone();
                if self.config.dry_run {
                    definition.execution.dry_run = true;
                }
                let executor = WorkflowExecutor::new(definition, self.registry.clone())
                    .with_hooks(self.hooks.iter().cloned().collect());
                let nested = executor.execute_with_context(inputs, child_ctx).await?;

                log::info!(
                    "Sub-workflow '{}' finished with status {}",
                    nested.workflow,
                    nested.status
                );
                let outputs = if nested.status == WorkflowStatus::Failed {
                    let failed: Vec<&str> = nested
                        .step_results
                        .iter()
                        .filter(|r| r.is_failed())
                        .map(|r| r.step_id.as_str())
                        .collect();
                    Err(format!(
                        "Sub-workflow '{}' failed: {}",
                        nested.workflow,
                        failed.join(", ")
                    ))
                } else {
                    Ok(nested.outputs)
                };
                Ok(BranchOutcome {
                    outputs,
                    nested: Vec::new(),
                })
            }
            other => Err(WorkflowError::InvalidDefinition(format!(
                "'{}' is not a branching action",
                other.kind()
            ))),
        }
    }

    /// Run steps one after another on a private copy of the state.
    ///
    /// Returns every result in recording order and the ids of failed steps.
    async fn run_sequence(
        &self,
        steps: &[WorkflowStep],
        state: &ExecutionState,
        ctx: &ExecutionContext,
    ) -> Result<(Vec<StepResult>, Vec<String>), WorkflowError> {
        let mut local = state.clone();
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for step in steps {
            if ctx.is_cancelled() {
                log::warn!("Execution cancelled; not starting step '{}'", step.id);
                break;
            }
            let run = self.run(step, &local, ctx).await?;
            let failed = run.result.is_failed();
            for result in run.into_results() {
                if result.is_success() {
                    local.record(&result.step_id, result.outputs.clone());
                }
                results.push(result);
            }
            if failed {
                failures.push(step.id.clone());
                if self.config.stops_on_failure() {
                    break;
                }
            }
        }
        Ok((results, failures))
    }
}

async fn dispatch(
    handler: &dyn ActionHandler,
    request: ActionRequest,
    step_id: &str,
    timeout_seconds: Option<f64>,
) -> Result<ActionOutputs, ActionError> {
    // A panicking handler is a failed attempt, whichever path dispatched it
    let attempt = AssertUnwindSafe(handler.execute(request))
        .catch_unwind()
        .map(|outcome| {
            outcome.unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                log::error!("Step '{}' handler panicked: {}", step_id, message);
                Err(ActionError::failed(format!("handler panicked: {}", message)))
            })
        });

    match timeout_seconds {
        Some(seconds) => tokio::time::timeout(to_duration(seconds), attempt)
            .await
            .unwrap_or_else(|_| {
                log::warn!("Step '{}' attempt timed out after {}s", step_id, seconds);
                Err(ActionError::TimedOut { seconds })
            }),
        None => attempt.await,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Sleep between attempts; false when cancelled first
async fn pause(delay: Duration, ctx: &ExecutionContext) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = ctx.cancellation().cancelled() => false,
    }
}

/// Definitions are validated before running, so bad values only fall back here
fn to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::action::ActionOutputs;
    use crate::opsflow::workflow::result::StepStatus;
    use crate::opsflow::workflow::types::ActionKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` attempts, then echoes its inputs
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyHandler {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ActionHandler for FlakyHandler {
        fn kind(&self) -> ActionKind {
            ActionKind::Transform
        }

        fn description(&self) -> &str {
            "Flaky transform"
        }

        async fn execute(&self, request: ActionRequest) -> Result<ActionOutputs, ActionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(ActionError::failed(format!("attempt {} failed", call)));
            }
            Ok(request.inputs)
        }
    }

    /// Sleeps longer than any test timeout
    struct SlowHandler;

    #[async_trait]
    impl ActionHandler for SlowHandler {
        fn kind(&self) -> ActionKind {
            ActionKind::Wait
        }

        fn description(&self) -> &str {
            "Slow"
        }

        async fn execute(&self, _request: ActionRequest) -> Result<ActionOutputs, ActionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ActionOutputs::new())
        }
    }

    struct RecordingHook {
        abort: Option<String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StepHook for RecordingHook {
        async fn before_step(&self, step: &WorkflowStep, _inputs: &Map<String, Value>) -> HookDecision {
            self.seen.lock().unwrap().push(format!("before:{}", step.id));
            match &self.abort {
                Some(reason) => HookDecision::Abort(reason.clone()),
                None => HookDecision::Continue,
            }
        }

        async fn after_step(&self, step: &WorkflowStep, result: &StepResult) {
            self.seen
                .lock()
                .unwrap()
                .push(format!("after:{}:{:?}", step.id, result.status));
        }
    }

    async fn executor_with(handler: Arc<dyn ActionHandler>) -> StepExecutor {
        let registry = ActionRegistry::new();
        registry.register(handler).await;
        StepExecutor::new(registry, Vec::new(), ExecutionConfig::default())
    }

    fn transform(id: &str) -> WorkflowStep {
        WorkflowStep::new(id, StepAction::Transform {})
    }

    #[tokio::test]
    async fn test_false_condition_skips_without_dispatch() {
        let handler = Arc::new(FlakyHandler::new(0));
        let executor = executor_with(handler.clone()).await;
        let step = transform("t").with_condition("inputs.enabled == true").with_retry(5, 0.0);
        let state = ExecutionState::new(json!({"enabled": false}).as_object().cloned().unwrap());

        let run = executor.run(&step, &state, &ExecutionContext::new()).await.unwrap();
        assert_eq!(run.result.status, StepStatus::Skipped);
        assert_eq!(run.result.attempts, 0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_condition_fails_step() {
        let executor = executor_with(Arc::new(FlakyHandler::new(0))).await;
        let step = transform("t").with_condition("a == ");

        let run = executor
            .run(&step, &ExecutionState::empty(), &ExecutionContext::new())
            .await
            .unwrap();
        assert!(run.result.is_failed());
        assert!(run.result.error.unwrap().starts_with("Condition error"));
    }

    #[tokio::test]
    async fn test_unresolved_input_fails_step() {
        let handler = Arc::new(FlakyHandler::new(0));
        let executor = executor_with(handler.clone()).await;
        let step = transform("t").with_input("x", "{{ missing.value }}");

        let run = executor
            .run(&step, &ExecutionState::empty(), &ExecutionContext::new())
            .await
            .unwrap();
        assert!(run.result.is_failed());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let handler = Arc::new(FlakyHandler::new(2));
        let executor = executor_with(handler.clone()).await;
        let step = transform("t").with_input("k", "v").with_retry(3, 2.0);

        let started = tokio::time::Instant::now();
        let run = executor
            .run(&step, &ExecutionState::empty(), &ExecutionContext::new())
            .await
            .unwrap();

        assert!(run.result.is_success());
        assert_eq!(run.result.attempts, 3);
        assert_eq!(run.result.outputs["k"], json!("v"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_last_error() {
        let executor = executor_with(Arc::new(FlakyHandler::new(10))).await;
        let step = transform("t").with_retry(2, 0.0);

        let run = executor
            .run(&step, &ExecutionState::empty(), &ExecutionContext::new())
            .await
            .unwrap();
        assert!(run.result.is_failed());
        assert_eq!(run.result.attempts, 2);
        assert_eq!(run.result.error.as_deref(), Some("attempt 2 failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_attempt() {
        let executor = executor_with(Arc::new(SlowHandler)).await;
        let step = WorkflowStep::new("slow", StepAction::Wait { seconds: 60.0 }).with_timeout(0.5);

        let run = executor
            .run(&step, &ExecutionState::empty(), &ExecutionContext::new())
            .await
            .unwrap();
        assert!(run.result.is_failed());
        assert_eq!(run.result.error.as_deref(), Some("Timed out after 0.5s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_attempts() {
        let handler = Arc::new(FlakyHandler::new(10));
        let executor = executor_with(handler.clone()).await;
        let step = transform("t").with_retry(5, 30.0);
        let token = tokio_util::sync::CancellationToken::new();
        let ctx = ExecutionContext::with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let run = executor.run(&step, &ExecutionState::empty(), &ctx).await.unwrap();
        canceller.await.unwrap();

        assert!(run.result.is_failed());
        assert_eq!(run.result.error.as_deref(), Some("cancelled"));
        assert_eq!(run.result.attempts, 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_abort_prevents_dispatch() {
        let handler = Arc::new(FlakyHandler::new(0));
        let registry = ActionRegistry::new();
        registry.register(handler.clone()).await;
        let hook = Arc::new(RecordingHook {
            abort: Some("blocked by policy".to_string()),
            seen: Mutex::new(Vec::new()),
        });
        let executor = StepExecutor::new(registry, vec![hook.clone()], ExecutionConfig::default());

        let run = executor
            .run(&transform("t"), &ExecutionState::empty(), &ExecutionContext::new())
            .await
            .unwrap();
        assert!(run.result.is_failed());
        assert_eq!(run.result.attempts, 0);
        assert_eq!(run.result.error.as_deref(), Some("Aborted by hook: blocked by policy"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *hook.seen.lock().unwrap(),
            vec!["before:t".to_string(), "after:t:Failed".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_handler_is_fatal() {
        let executor = StepExecutor::new(ActionRegistry::new(), Vec::new(), ExecutionConfig::default());
        let result = executor
            .run(&transform("t"), &ExecutionState::empty(), &ExecutionContext::new())
            .await;
        assert!(matches!(result, Err(WorkflowError::MissingHandler { .. })));
    }

    #[tokio::test]
    async fn test_conditional_runs_chosen_branch_in_order() {
        let executor = executor_with(Arc::new(FlakyHandler::new(0))).await;
        let step = WorkflowStep::new(
            "gate",
            StepAction::Conditional {
                expression: "inputs.env == 'prod'".to_string(),
                then_steps: vec![
                    transform("first").with_input("a", "1"),
                    transform("second").with_input("b", "{{ first.a }}"),
                ],
                else_steps: vec![transform("other")],
            },
        );
        let state = ExecutionState::new(json!({"env": "prod"}).as_object().cloned().unwrap());

        let run = executor.run(&step, &state, &ExecutionContext::new()).await.unwrap();
        assert!(run.result.is_success());
        assert_eq!(run.result.outputs["branch"], json!("then"));
        assert_eq!(run.result.outputs["b"], json!("1"));
        let ids: Vec<&str> = run.nested.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_parallel_group_fails_when_a_child_fails() {
        let executor = executor_with(Arc::new(FlakyHandler::new(0))).await;
        let step = WorkflowStep::new(
            "group",
            StepAction::ParallelGroup {
                steps: vec![
                    transform("ok").with_input("x", "1"),
                    transform("bad").with_input("y", "{{ nowhere.y }}"),
                ],
            },
        );

        let run = executor
            .run(&step, &ExecutionState::empty(), &ExecutionContext::new())
            .await
            .unwrap();
        assert!(run.result.is_failed());
        assert!(run.result.error.unwrap().contains("bad"));
        let ids: Vec<&str> = run.nested.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "bad"]);
    }
}
