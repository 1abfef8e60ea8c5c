//! HTTP error bodies: `{"error": "...", "code": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

use flowbot_agent::pipeline::ValidationError;
use flowbot_agent::workflow::GenerateError;
use flowbot_channels::ChannelError;
use flowbot_core::FlowbotError;
use flowbot_deployments::DeploymentError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "AUTH_FAILED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({"error": self.message, "code": self.code})),
        )
            .into_response()
    }
}

impl From<FlowbotError> for ApiError {
    fn from(e: FlowbotError) -> Self {
        let status = match &e {
            FlowbotError::Validation(_) | FlowbotError::Serialization(_) => StatusCode::BAD_REQUEST,
            FlowbotError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            FlowbotError::DeploymentNotFound { .. } => StatusCode::NOT_FOUND,
            FlowbotError::DeploymentInactive { .. } => StatusCode::LOCKED,
            FlowbotError::Completion(_) | FlowbotError::Channel { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %e, "request failed");
        }
        Self::new(status, e.code(), e.to_string())
    }
}

impl From<DeploymentError> for ApiError {
    fn from(e: DeploymentError) -> Self {
        let e = match e {
            DeploymentError::NotFound { id } => FlowbotError::DeploymentNotFound { id },
            DeploymentError::Inactive { id, status } => FlowbotError::DeploymentInactive { id, status },
            DeploymentError::InvalidConfig(reason) => FlowbotError::Validation(reason),
            other => FlowbotError::Database(other.to_string()),
        };
        e.into()
    }
}

impl From<ChannelError> for ApiError {
    fn from(e: ChannelError) -> Self {
        let status = match e {
            ChannelError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            ChannelError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ChannelError::SendFailed(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.code(), e.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<GenerateError> for ApiError {
    fn from(e: GenerateError) -> Self {
        match &e {
            GenerateError::EmptyPrompt => Self::bad_request(e.to_string()),
            _ => FlowbotError::Completion(e.to_string()).into(),
        }
    }
}
