use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use flowbot_channels::Delivery;
use flowbot_core::Platform;

use super::error::ApiError;
use super::inbound::{parse_json, ChannelRequest};
use crate::app::AppState;

/// POST /api/v1/deployments/{deployment_id}/messages
///
/// Bearer-authenticated with the deployment's API key. Returns the reply,
/// the execution record and, on failure, the error detail.
pub async fn api_message(
    State(state): State<Arc<AppState>>,
    Path(deployment_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let channel = ChannelRequest::open(&state, &deployment_id, Platform::Api, &headers, &body)?;
    let payload = parse_json(&body)?;
    let Some((inbound, processed)) = channel.process(&state, &payload).await? else {
        return Err(ApiError::bad_request("nothing to answer in request"));
    };

    let reply = match channel.adapter.deliver(&inbound, &processed.reply).await? {
        Delivery::Inline(text) => text,
        Delivery::Sent => processed.reply.clone(),
    };
    Ok(Json(json!({
        "reply": reply,
        "execution": processed.execution,
        "error": processed.error,
    })))
}
