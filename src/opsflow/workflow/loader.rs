//! Workflow loader - YAML/JSON file loading and parsing
//!
//! This module handles loading workflow definitions from disk and locating
//! named workflows in a workflows directory.

use super::types::WorkflowDefinition;
use crate::adk::error::WorkflowError;
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Loads workflow definitions from YAML or JSON files
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition, picking the format from the file extension
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, WorkflowError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(WorkflowError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)?;
        let definition = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::parse_json(&content)?,
            _ => Self::parse_yaml(&content)?,
        };
        log::debug!("Loaded workflow '{}' from {}", definition.name, path.display());
        Ok(definition)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition, WorkflowError> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        Ok(def)
    }

    /// Parse a workflow definition from a JSON string
    pub fn parse_json(content: &str) -> Result<WorkflowDefinition, WorkflowError> {
        let def: WorkflowDefinition = serde_json::from_str(content)?;
        Ok(def)
    }

    /// Workflow ids (file stems) available in a directory, sorted
    pub fn list_workflows<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<String>, WorkflowError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !has_workflow_extension(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Locate `<id>.yaml`, `<id>.yml` or `<id>.json` in a directory
    pub fn find_workflow<P: AsRef<Path>>(&self, dir: P, id: &str) -> Result<PathBuf, WorkflowError> {
        // Ids are file stems, never paths
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(WorkflowError::FileNotFound(id.to_string()));
        }

        EXTENSIONS
            .iter()
            .map(|ext| dir.as_ref().join(format!("{}.{}", id, ext)))
            .find(|path| path.is_file())
            .ok_or_else(|| WorkflowError::FileNotFound(id.to_string()))
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn has_workflow_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opsflow::workflow::types::{ExecutionMode, StepAction};

    #[test]
    fn test_parse_full_workflow() {
        let yaml = r#"
name: triage
version: "2.1"
description: "Triage incoming items"

execution:
  mode: dependency_aware
  fail_fast: true
  parallel_limit: 4

steps:
  - id: fetch
    action: http_request
    url: https://example.com/items
    retry: { max_attempts: 3, delay_seconds: 1.5 }
    timeout_seconds: 10
  - id: classify
    action: invoke_agent
    agent: classifier
    depends_on: fetch
    inputs:
      text: "{{ fetch.body }}"
    condition: "fetch.status == 200"
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        assert_eq!(def.name, "triage");
        assert_eq!(def.version, "2.1");
        assert_eq!(def.execution.mode, ExecutionMode::DependencyAware);
        assert!(def.execution.fail_fast);
        assert_eq!(def.execution.parallel_limit, 4);
        assert_eq!(def.steps.len(), 2);

        match &def.steps[0].action {
            StepAction::HttpRequest { method, url, .. } => {
                assert_eq!(method, "GET");
                assert_eq!(url, "https://example.com/items");
            }
            other => panic!("Expected HttpRequest, got {:?}", other),
        }
        assert_eq!(def.steps[1].depends_on.to_vec(), vec!["fetch"]);
    }

    #[test]
    fn test_parse_defaults() {
        let def = WorkflowLoader::parse_yaml("name: minimal\n").unwrap();
        assert_eq!(def.version, "1.0");
        assert!(def.steps.is_empty());
        assert_eq!(def.execution.mode, ExecutionMode::Sequential);
        assert_eq!(def.execution.parallel_limit, 5);
    }

    #[test]
    fn test_parse_embedded_sub_workflow() {
        let yaml = r#"
name: parent
steps:
  - id: child
    action: sub_workflow
    workflow:
      name: inner
      steps:
        - id: t
          action: transform
"#;
        let def = WorkflowLoader::parse_yaml(yaml).unwrap();
        match &def.steps[0].action {
            StepAction::SubWorkflow { workflow } => {
                assert_eq!(workflow.name, "inner");
                assert_eq!(workflow.steps.len(), 1);
            }
            other => panic!("Expected SubWorkflow, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"name": "j", "steps": [{"id": "w", "action": "wait", "seconds": 1}]}"#;
        let def = WorkflowLoader::parse_json(json).unwrap();
        assert_eq!(def.steps[0].id, "w");
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let yaml = r#"
name:
  - invalid structure
"#;
        let result = WorkflowLoader::parse_yaml(yaml);
        assert!(matches!(result, Err(WorkflowError::Yaml(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = WorkflowLoader::new().load_workflow("/definitely/not/here.yaml");
        assert!(matches!(result, Err(WorkflowError::FileNotFound(_))));
    }

    #[test]
    fn test_load_list_and_find_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("deploy.yaml"), "name: deploy\n").unwrap();
        fs::write(dir.path().join("report.json"), r#"{"name": "report"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loader = WorkflowLoader::new();
        assert_eq!(loader.list_workflows(dir.path()).unwrap(), vec!["deploy", "report"]);

        let path = loader.find_workflow(dir.path(), "report").unwrap();
        assert_eq!(loader.load_workflow(path).unwrap().name, "report");

        assert!(loader.find_workflow(dir.path(), "notes").is_err());
        assert!(loader.find_workflow(dir.path(), "../deploy").is_err());
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let ids = WorkflowLoader::new().list_workflows("/no/such/dir").unwrap();
        assert!(ids.is_empty());
    }
}
