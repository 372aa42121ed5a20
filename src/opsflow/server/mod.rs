// SPDX-License-Identifier: MIT

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::{OpsflowError, WorkflowError};
use crate::opsflow::config::EngineConfig;
use crate::opsflow::workflow::backpressure::BackpressureController;
use crate::opsflow::workflow::executor::{plan, WorkflowExecutor};
use crate::opsflow::workflow::loader::WorkflowLoader;
use crate::opsflow::workflow::registry::ActionRegistry;
use crate::opsflow::workflow::types::WorkflowDefinition;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub registry: ActionRegistry,
    pub backpressure: Arc<BackpressureController>,
}

impl AppState {
    pub fn new(config: EngineConfig, registry: ActionRegistry) -> Self {
        let backpressure = Arc::new(BackpressureController::new(config.max_concurrent_executions));
        Self {
            config: Arc::new(config),
            registry,
            backpressure,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/plan", post(plan_workflow))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/executions", post(create_execution))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(config: EngineConfig) -> Result<(), OpsflowError> {
    let registry = ActionRegistry::with_builtins(&config).await?;
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let app = router(AppState::new(config, registry));

    log::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Error body returned by every endpoint
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let status = match &err {
            WorkflowError::FileNotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Returns its backpressure token when dropped
struct Admission(Arc<BackpressureController>);

impl Drop for Admission {
    fn drop(&mut self) {
        self.0.release();
    }
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "available_executions": state.backpressure.available(),
        "max_executions": state.backpressure.max_tokens(),
    }))
}

async fn list_workflows(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let loader = WorkflowLoader::new();
    let ids = loader.list_workflows(&state.config.workflows_dir)?;
    let workflows: Vec<Value> = ids
        .into_iter()
        .map(|id| json!({ "id": id }))
        .collect();
    Ok(Json(json!(workflows)))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    let loader = WorkflowLoader::new();
    let path = loader.find_workflow(&state.config.workflows_dir, &id)?;
    Ok(Json(loader.load_workflow(path)?))
}

async fn plan_workflow(Json(definition): Json<WorkflowDefinition>) -> Result<Json<Value>, ApiError> {
    let waves = plan(&definition)?;
    Ok(Json(json!({
        "workflow": definition.name,
        "waves": waves,
    })))
}

#[derive(Deserialize)]
struct ExecutionRequest {
    #[serde(default)]
    workflow_id: Option<String>,
    #[serde(default)]
    workflow: Option<WorkflowDefinition>,
    #[serde(default)]
    inputs: Map<String, Value>,
    #[serde(default)]
    dry_run: bool,
}

async fn create_execution(
    State(state): State<AppState>,
    Json(payload): Json<ExecutionRequest>,
) -> Result<Response, ApiError> {
    if !state.backpressure.acquire() {
        log::warn!("Rejecting execution: no capacity");
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many concurrent executions",
        ));
    }
    let _admission = Admission(state.backpressure.clone());

    let mut definition = match (payload.workflow, payload.workflow_id) {
        (Some(definition), _) => definition,
        (None, Some(id)) => {
            let loader = WorkflowLoader::new();
            let path = loader.find_workflow(&state.config.workflows_dir, &id)?;
            loader.load_workflow(path)?
        }
        (None, None) => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "Either 'workflow_id' or 'workflow' is required",
            ));
        }
    };
    if payload.dry_run {
        definition.execution.dry_run = true;
    }

    log::info!("Starting execution of workflow '{}'", definition.name);
    let executor = WorkflowExecutor::new(definition, state.registry.clone());
    let result = executor.execute(payload.inputs).await?;
    Ok(Json(result).into_response())
}
