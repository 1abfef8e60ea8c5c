use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use flowbot_deployments::{DeploymentManager, SuspendReport};

use crate::error::Result;
use crate::runner::Sweep;

/// Suspends subscriptions whose paid period ended more than `grace` ago,
/// together with their owners' active deployments.
pub struct SubscriptionSweep {
    deployments: Arc<DeploymentManager>,
    grace: Duration,
}

impl SubscriptionSweep {
    pub fn new(deployments: Arc<DeploymentManager>, grace: Duration) -> Self {
        Self { deployments, grace }
    }

    /// One pass against an explicit clock.
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<SuspendReport> {
        let report = self.deployments.suspend_expired(now, self.grace)?;
        if !report.is_empty() {
            info!(
                owners = ?report.owners,
                deployments = report.deployments,
                "suspended lapsed subscriptions"
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl Sweep for SubscriptionSweep {
    fn name(&self) -> &str {
        "subscription-suspension"
    }

    async fn run_once(&self) -> Result<usize> {
        let report = self.run_at(Utc::now())?;
        Ok(report.owners.len() + report.deployments)
    }
}
