//! Platform webhooks: POST /webhooks/telegram/{id} and /webhooks/slack/{id}.
//!
//! Both platforms retry anything that is not a 2xx, so once a request is
//! authenticated the handler answers 200 even when delivery fails; the
//! failure is logged instead.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use flowbot_channels::slack::SlackAdapter;
use flowbot_core::Platform;

use super::error::ApiError;
use super::inbound::{parse_json, ChannelRequest};
use crate::app::AppState;

/// Set by Slack on redeliveries of an event it thinks timed out.
const SLACK_RETRY_HEADER: &str = "x-slack-retry-num";

/// POST /webhooks/telegram/{deployment_id}
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    Path(deployment_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let channel = ChannelRequest::open(&state, &deployment_id, Platform::Telegram, &headers, &body)?;
    let payload = parse_json(&body)?;
    answer(&state, &channel, &payload).await
}

/// POST /webhooks/slack/{deployment_id}
pub async fn slack_webhook(
    State(state): State<Arc<AppState>>,
    Path(deployment_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let channel = ChannelRequest::open(&state, &deployment_id, Platform::Slack, &headers, &body)?;
    let payload = parse_json(&body)?;

    if let Some(challenge) = SlackAdapter::challenge(&payload) {
        info!(deployment = %deployment_id, "Slack URL verification");
        return Ok(Json(json!({ "challenge": challenge })));
    }
    // The first delivery is still being answered.
    if let Some(retry) = headers.get(SLACK_RETRY_HEADER) {
        debug!(deployment = %deployment_id, ?retry, "ignoring Slack redelivery");
        return Ok(Json(json!({ "ok": true, "ignored": true })));
    }
    answer(&state, &channel, &payload).await
}

async fn answer(
    state: &AppState,
    channel: &ChannelRequest,
    payload: &Value,
) -> Result<Json<Value>, ApiError> {
    let Some((inbound, processed)) = channel.process(state, payload).await? else {
        return Ok(Json(json!({ "ok": true, "ignored": true })));
    };

    if let Err(e) = channel.adapter.deliver(&inbound, &processed.reply).await {
        warn!(
            deployment = %channel.deployment.id,
            platform = %inbound.platform,
            code = e.code(),
            error = %e,
            "reply delivery failed"
        );
    }
    Ok(Json(json!({ "ok": true })))
}
