// SPDX-License-Identifier: MIT

//! Step and workflow result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default)]
    pub outputs: Map<String, Value>,
    /// Present iff the step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Dispatch attempts made (0 when skipped or never dispatched)
    #[serde(default)]
    pub attempts: u32,
}

impl StepResult {
    pub fn success(step_id: &str, outputs: Map<String, Value>, duration_ms: u64, attempts: u32) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Success,
            outputs,
            error: None,
            duration_ms,
            attempts,
        }
    }

    pub fn failed(step_id: &str, error: impl Into<String>, duration_ms: u64, attempts: u32) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Failed,
            outputs: Map::new(),
            error: Some(error.into()),
            duration_ms,
            attempts,
        }
    }

    pub fn skipped(step_id: &str, duration_ms: u64) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Skipped,
            outputs: Map::new(),
            error: None,
            duration_ms,
            attempts: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Terminal status of a workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Success,
    Failed,
    Partial,
    Skipped,
}

impl WorkflowStatus {
    /// Derive the terminal status from step results.
    ///
    /// Failures with no success are `failed`, failures alongside a success
    /// are `partial`. Runs where every step was skipped are `skipped`.
    pub fn from_results(results: &[StepResult]) -> Self {
        let failed = results.iter().any(|r| r.is_failed());
        let succeeded = results.iter().any(|r| r.is_success());

        match (failed, succeeded) {
            (true, false) => WorkflowStatus::Failed,
            (true, true) => WorkflowStatus::Partial,
            (false, false) if !results.is_empty() => WorkflowStatus::Skipped,
            _ => WorkflowStatus::Success,
        }
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Success => write!(f, "success"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Partial => write!(f, "partial"),
            WorkflowStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Aggregated result of one `execute()` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub execution_id: String,
    pub workflow: String,
    pub status: WorkflowStatus,
    /// Last-write-wins merge of successful step outputs, in `step_results` order
    pub outputs: Map<String, Value>,
    pub steps_executed: Vec<String>,
    pub step_results: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Set when caller cancellation stopped the run before every step was issued
    #[serde(default)]
    pub cancelled: bool,
}

impl WorkflowResult {
    /// Look up the result for a step id
    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }
}

/// Merge successful outputs in order; later keys overwrite earlier ones
pub fn merge_outputs(results: &[StepResult]) -> Map<String, Value> {
    let mut merged = Map::new();
    for result in results.iter().filter(|r| r.is_success()) {
        for (key, value) in &result.outputs {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_status_from_results() {
        let ok = StepResult::success("a", Map::new(), 1, 1);
        let bad = StepResult::failed("b", "boom", 1, 1);
        let skip = StepResult::skipped("c", 0);

        assert_eq!(WorkflowStatus::from_results(&[]), WorkflowStatus::Success);
        assert_eq!(
            WorkflowStatus::from_results(&[ok.clone(), skip.clone()]),
            WorkflowStatus::Success
        );
        assert_eq!(
            WorkflowStatus::from_results(&[bad.clone(), skip.clone()]),
            WorkflowStatus::Failed
        );
        assert_eq!(
            WorkflowStatus::from_results(&[ok, bad]),
            WorkflowStatus::Partial
        );
        assert_eq!(WorkflowStatus::from_results(&[skip]), WorkflowStatus::Skipped);
    }

    #[test]
    fn test_merge_is_last_write_wins_and_ignores_failures() {
        let results = vec![
            StepResult::success("a", outputs(json!({"k": 1, "a": true})), 1, 1),
            StepResult::failed("b", "boom", 1, 1),
            StepResult::success("c", outputs(json!({"k": 3})), 1, 1),
        ];
        let merged = merge_outputs(&results);
        assert_eq!(merged["k"], json!(3));
        assert_eq!(merged["a"], json!(true));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_failed_result_serializes_error() {
        let result = StepResult::failed("x", "bad input", 5, 2);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "bad input");
        assert_eq!(json["attempts"], 2);

        let ok = serde_json::to_value(StepResult::success("y", Map::new(), 1, 1)).unwrap();
        assert!(ok.get("error").is_none());
    }
}
