use flowbot_deployments::DeploymentError;

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Deployment store error: {0}")]
    Deployments(#[from] DeploymentError),

    #[error("Sweep task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SweepError>;
