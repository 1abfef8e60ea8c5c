use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe with the models in use.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let completion = &state.config.completion;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": completion.primary_model,
        "fallback_model": completion.fallback_model,
    }))
}
