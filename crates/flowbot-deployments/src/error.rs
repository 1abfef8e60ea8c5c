use thiserror::Error;

/// Errors that can occur during deployment operations.
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// The requested deployment does not exist in the database.
    #[error("deployment not found: {id}")]
    NotFound { id: String },

    /// The deployment exists but does not accept messages right now.
    #[error("deployment {id} is {status}")]
    Inactive { id: String, status: String },

    /// The channel settings failed validation.
    #[error("invalid channel config: {0}")]
    InvalidConfig(String),

    /// A stored JSON column could not be decoded.
    #[error("corrupt row for deployment {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DeploymentError>;
