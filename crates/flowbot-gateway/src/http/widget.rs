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

/// POST /widget/{deployment_id}/messages
///
/// Visitors only ever see the reply text; failure detail stays in the logs.
pub async fn widget_message(
    State(state): State<Arc<AppState>>,
    Path(deployment_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let channel = ChannelRequest::open(&state, &deployment_id, Platform::Widget, &headers, &body)?;
    let payload = parse_json(&body)?;
    let Some((inbound, processed)) = channel.process(&state, &payload).await? else {
        return Err(ApiError::bad_request("nothing to answer in request"));
    };

    let reply = match channel.adapter.deliver(&inbound, &processed.reply).await? {
        Delivery::Inline(text) => text,
        Delivery::Sent => processed.reply,
    };
    Ok(Json(json!({ "reply": reply })))
}
