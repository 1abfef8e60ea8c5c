use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowbotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Deployment not found: {id}")]
    DeploymentNotFound { id: String },

    #[error("Deployment {id} is {status}")]
    DeploymentInactive { id: String, status: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Channel error ({channel}): {reason}")]
    Channel { channel: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowbotError {
    /// Short error code string returned in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            FlowbotError::Config(_) => "CONFIG_ERROR",
            FlowbotError::Validation(_) => "VALIDATION_ERROR",
            FlowbotError::AuthFailed(_) => "AUTH_FAILED",
            FlowbotError::DeploymentNotFound { .. } => "DEPLOYMENT_NOT_FOUND",
            FlowbotError::DeploymentInactive { .. } => "DEPLOYMENT_INACTIVE",
            FlowbotError::Database(_) => "DATABASE_ERROR",
            FlowbotError::Completion(_) => "COMPLETION_ERROR",
            FlowbotError::Channel { .. } => "CHANNEL_ERROR",
            FlowbotError::Serialization(_) => "SERIALIZATION_ERROR",
            FlowbotError::Io(_) => "IO_ERROR",
            FlowbotError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowbotError>;
