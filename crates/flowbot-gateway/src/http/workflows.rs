//! Dashboard routes: test-run a workflow and generate one from a prompt.
//!
//! Both require `Authorization: Bearer <gateway.token>` when a token is
//! configured.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use flowbot_agent::workflow::{edit_workflow, generate_workflow as generate};
use flowbot_agent::ExecutionResult;
use flowbot_core::WorkflowSpec;

use super::error::ApiError;
use super::inbound::request_meta;
use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub workflow: WorkflowSpec,
    pub message: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    /// When present, the prompt is applied as an edit to this workflow.
    #[serde(default)]
    pub current: Option<WorkflowSpec>,
}

/// POST /api/workflows/execute
pub async fn execute_workflow(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ExecutionResult>, ApiError> {
    require_dashboard_token(&state, &headers)?;
    let req: ExecuteRequest = parse(&body)?;
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    let result = state
        .executor
        .execute(&req.workflow, &req.message, req.user_name.as_deref())
        .await;
    Ok(Json(result))
}

/// POST /api/workflows/generate
pub async fn generate_workflow(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    require_dashboard_token(&state, &headers)?;
    let req: GenerateRequest = parse(&body)?;

    let provider = state.executor.provider().as_ref();
    let model = state.executor.model();
    let workflow = match &req.current {
        Some(current) => edit_workflow(provider, model, current, &req.prompt).await?,
        None => generate(provider, model, &req.prompt).await?,
    };
    info!(name = %workflow.name, steps = workflow.steps.len(), "dashboard workflow ready");
    Ok(Json(json!({ "workflow": workflow })))
}

fn require_dashboard_token(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config.gateway.token.as_deref() else {
        return Ok(());
    };
    match request_meta(headers, &[]).bearer() {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(ApiError::unauthorized("dashboard token mismatch")),
        None => Err(ApiError::unauthorized("missing dashboard token")),
    }
}

fn parse<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))
}
