use thiserror::Error;

/// Errors raised at the channel boundary.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Signature, secret token, API key or origin did not check out.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// The payload is not something this channel understands.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The reply could not be delivered to the platform.
    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl ChannelError {
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::AuthFailed(_) => "AUTH_FAILED",
            ChannelError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ChannelError::SendFailed(_) => "SEND_FAILED",
        }
    }
}
