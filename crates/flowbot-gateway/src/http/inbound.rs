//! Shared path for the channel routes: resolve the deployment, check the
//! request against its adapter, run the pipeline.

use axum::http::{HeaderMap, StatusCode};
use serde_json::Value;
use tracing::warn;

use flowbot_agent::pipeline::{process_inbound, ProcessedMessage};
use flowbot_channels::{adapter_for, ChannelAdapter, ChannelError, RequestMeta};
use flowbot_core::{InboundMessage, Platform};
use flowbot_deployments::Deployment;

use super::error::ApiError;
use crate::app::AppState;

/// An authenticated request for an active deployment.
pub struct ChannelRequest {
    pub deployment: Deployment,
    pub adapter: Box<dyn ChannelAdapter>,
}

impl ChannelRequest {
    /// 404 for an unknown deployment, 423 for a paused or suspended one,
    /// 400 when the route's platform is not the deployment's, 401 when the
    /// adapter rejects the request.
    pub fn open(
        state: &AppState,
        deployment_id: &str,
        platform: Platform,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Self, ApiError> {
        let deployment = state.deployments.get_active(deployment_id)?;
        let configured = deployment.channel.platform();
        if configured != platform {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "PLATFORM_MISMATCH",
                format!("deployment {deployment_id} is configured for {configured}, not {platform}"),
            ));
        }

        let adapter = adapter_for(&deployment.channel);
        if let Err(e) = adapter.authenticate(&request_meta(headers, body)) {
            warn!(deployment = %deployment_id, %platform, error = %e, "channel request rejected");
            return Err(e.into());
        }
        Ok(Self { deployment, adapter })
    }

    /// Normalize and run one turn. `None` when the payload carries nothing
    /// to answer.
    pub async fn process(
        &self,
        state: &AppState,
        payload: &Value,
    ) -> Result<Option<(InboundMessage, ProcessedMessage)>, ApiError> {
        let Some(inbound) = self.adapter.normalize(payload)? else {
            return Ok(None);
        };
        let processed = process_inbound(state, &self.deployment, &inbound).await?;
        Ok(Some((inbound, processed)))
    }
}

/// Borrow the headers that are valid UTF-8.
pub fn request_meta<'a>(headers: &'a HeaderMap, body: &'a [u8]) -> RequestMeta<'a> {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(RequestMeta::new(body), |meta, (name, value)| meta.with_header(name, value))
}

pub fn parse_json(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ChannelError::InvalidPayload(format!("invalid JSON body: {e}")).into())
}
