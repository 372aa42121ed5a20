// SPDX-License-Identifier: MIT

use crate::adk::action::ActionHandler;
use crate::adk::error::OpsflowError;
use crate::opsflow::actions;
use crate::opsflow::config::EngineConfig;
use crate::opsflow::workflow::types::ActionKind;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handler table keyed by action tag
#[derive(Clone)]
pub struct ActionRegistry {
    handlers: Arc<RwLock<HashMap<ActionKind, Arc<dyn ActionHandler>>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry holding the built-in handlers for this configuration
    pub async fn with_builtins(config: &EngineConfig) -> Result<Self, OpsflowError> {
        let registry = Self::new();
        for handler in actions::builtin_handlers(config)? {
            log::info!("Registered action: {}", handler.kind());
            registry.register(handler).await;
        }
        Ok(registry)
    }

    /// Register a handler, replacing any previous one for the same kind
    pub async fn register(&self, handler: Arc<dyn ActionHandler>) {
        let kind = handler.kind();
        if kind.is_branching() {
            log::warn!("Ignoring handler for '{}': branching actions run in the engine", kind);
            return;
        }
        let mut handlers = self.handlers.write().await;
        handlers.insert(kind, handler);
    }

    pub async fn get(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        let handlers = self.handlers.read().await;
        handlers.get(&kind).cloned()
    }

    pub async fn contains(&self, kind: ActionKind) -> bool {
        self.handlers.read().await.contains_key(&kind)
    }

    /// Registered kinds, sorted by tag name
    pub async fn kinds(&self) -> Vec<ActionKind> {
        let mut kinds: Vec<ActionKind> = self.handlers.read().await.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::action::{ActionOutputs, ActionRequest};
    use crate::adk::error::ActionError;
    use async_trait::async_trait;
    use serde_json::json;

    /// A mock handler for testing
    struct MockHandler {
        kind: ActionKind,
        tag: &'static str,
    }

    impl MockHandler {
        fn new(kind: ActionKind, tag: &'static str) -> Self {
            Self { kind, tag }
        }
    }

    #[async_trait]
    impl ActionHandler for MockHandler {
        fn kind(&self) -> ActionKind {
            self.kind
        }

        fn description(&self) -> &str {
            "Mock handler"
        }

        async fn execute(&self, _request: ActionRequest) -> Result<ActionOutputs, ActionError> {
            let mut out = ActionOutputs::new();
            out.insert("tag".to_string(), json!(self.tag));
            Ok(out)
        }
    }

    #[tokio::test]
    async fn test_register_and_get_handler() {
        let registry = ActionRegistry::new();
        registry
            .register(Arc::new(MockHandler::new(ActionKind::Transform, "t")))
            .await;

        let retrieved = registry.get(ActionKind::Transform).await;
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().kind(), ActionKind::Transform);
        assert!(registry.contains(ActionKind::Transform).await);
    }

    #[tokio::test]
    async fn test_get_missing_handler() {
        let registry = ActionRegistry::new();
        assert!(registry.get(ActionKind::Wait).await.is_none());
    }

    #[tokio::test]
    async fn test_register_overwrites_existing() {
        let registry = ActionRegistry::new();
        registry
            .register(Arc::new(MockHandler::new(ActionKind::Route, "first")))
            .await;
        registry
            .register(Arc::new(MockHandler::new(ActionKind::Route, "second")))
            .await;

        let handler = registry.get(ActionKind::Route).await.unwrap();
        let out = handler
            .execute(ActionRequest {
                step_id: "r".to_string(),
                action: crate::opsflow::workflow::types::StepAction::Transform {},
                inputs: Default::default(),
                dry_run: false,
            })
            .await
            .unwrap();
        assert_eq!(out["tag"], json!("second"));
    }

    #[tokio::test]
    async fn test_branching_kinds_are_not_registered() {
        let registry = ActionRegistry::new();
        registry
            .register(Arc::new(MockHandler::new(ActionKind::SubWorkflow, "x")))
            .await;
        assert!(!registry.contains(ActionKind::SubWorkflow).await);
    }

    #[tokio::test]
    async fn test_with_builtins() {
        let registry = ActionRegistry::with_builtins(&EngineConfig::default())
            .await
            .unwrap();
        for kind in [
            ActionKind::RunCommand,
            ActionKind::ExecuteCode,
            ActionKind::HttpRequest,
            ActionKind::Wait,
            ActionKind::Transform,
            ActionKind::Validate,
            ActionKind::Route,
        ] {
            assert!(registry.contains(kind).await, "missing {}", kind);
        }
        assert!(!registry.contains(ActionKind::InvokeAgent).await);

        let config = EngineConfig {
            agent_url: Some("http://localhost:9000/agents".to_string()),
            ..Default::default()
        };
        let registry = ActionRegistry::with_builtins(&config).await.unwrap();
        assert!(registry.contains(ActionKind::InvokeAgent).await);
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = ActionRegistry::new();
        let cloned = registry.clone();
        cloned
            .register(Arc::new(MockHandler::new(ActionKind::Wait, "w")))
            .await;
        assert!(registry.contains(ActionKind::Wait).await);
        assert_eq!(registry.kinds().await, vec![ActionKind::Wait]);
    }
}
