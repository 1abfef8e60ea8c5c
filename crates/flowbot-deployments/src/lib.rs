pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::DeploymentError;
pub use manager::DeploymentManager;
pub use types::{Deployment, DeploymentStatus, SubscriptionStatus, Subscription, SuspendReport};
