use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::Connection;
use tracing::{debug, info, instrument};

use flowbot_core::{AgentProfile, ChannelConfig, DeploymentId};

use crate::error::{DeploymentError, Result};
use crate::types::{
    Deployment, DeploymentStatus, Subscription, SubscriptionStatus, SuspendReport,
};

const SELECT_DEPLOYMENT: &str = "SELECT id, owner_id, name, status, agent, channel, created_at, updated_at
     FROM deployments";

/// Registry of deployed agents and their owners' subscription state.
///
/// Wraps a single SQLite connection in a `Mutex`, like the other managers.
pub struct DeploymentManager {
    db: Mutex<Connection>,
}

impl DeploymentManager {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Register a new active deployment. The channel config is validated first.
    #[instrument(skip(self, agent, channel), fields(platform = %channel.platform()))]
    pub fn create(
        &self,
        owner_id: &str,
        name: &str,
        agent: AgentProfile,
        channel: ChannelConfig,
    ) -> Result<Deployment> {
        channel
            .validate()
            .map_err(|e| DeploymentError::InvalidConfig(e.to_string()))?;

        let id = DeploymentId::new();
        let now = timestamp(Utc::now());
        let agent_json = encode(&id, &agent)?;
        let channel_json = encode(&id, &channel)?;

        let db = self.lock();
        db.execute(
            "INSERT INTO deployments
             (id, owner_id, name, platform, status, agent, channel, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6, ?7, ?7)",
            rusqlite::params![
                id.as_str(),
                owner_id,
                name,
                channel.platform().as_str(),
                agent_json,
                channel_json,
                now
            ],
        )?;
        info!(deployment = %id, "deployment created");

        Ok(Deployment {
            id,
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            status: DeploymentStatus::Active,
            agent,
            channel,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Retrieve a deployment by id, returning `None` if it does not exist.
    pub fn get(&self, id: &str) -> Result<Option<Deployment>> {
        let db = self.lock();
        let row = db.query_row(
            &format!("{SELECT_DEPLOYMENT} WHERE id = ?1"),
            rusqlite::params![id],
            read_row,
        );
        match row {
            Ok(raw) => Ok(Some(raw.decode()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DeploymentError::Database(e)),
        }
    }

    /// Retrieve a deployment that is allowed to take messages.
    pub fn get_active(&self, id: &str) -> Result<Deployment> {
        let deployment = self
            .get(id)?
            .ok_or_else(|| DeploymentError::NotFound { id: id.to_string() })?;
        if !deployment.is_active() {
            return Err(DeploymentError::Inactive {
                id: id.to_string(),
                status: deployment.status.to_string(),
            });
        }
        Ok(deployment)
    }

    /// List an owner's deployments, most recently updated first.
    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Deployment>> {
        let db = self.lock();
        let mut stmt = db.prepare(&format!(
            "{SELECT_DEPLOYMENT} WHERE owner_id = ?1 ORDER BY updated_at DESC"
        ))?;
        let rows = stmt.query_map(rusqlite::params![owner_id], read_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.decode()?);
        }
        Ok(out)
    }

    /// Change a deployment's status.
    #[instrument(skip(self))]
    pub fn set_status(&self, id: &str, status: DeploymentStatus) -> Result<()> {
        let now = timestamp(Utc::now());
        let db = self.lock();
        let rows_changed = db.execute(
            "UPDATE deployments SET status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![status.to_string(), now, id],
        )?;
        if rows_changed == 0 {
            return Err(DeploymentError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Record the billing state for an owner (insert or replace).
    #[instrument(skip(self))]
    pub fn upsert_subscription(
        &self,
        owner_id: &str,
        status: SubscriptionStatus,
        current_period_end: DateTime<Utc>,
    ) -> Result<()> {
        let now = timestamp(Utc::now());
        let db = self.lock();
        db.execute(
            "INSERT INTO subscriptions (owner_id, status, current_period_end, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                status = excluded.status,
                current_period_end = excluded.current_period_end,
                updated_at = excluded.updated_at",
            rusqlite::params![
                owner_id,
                status.to_string(),
                timestamp(current_period_end),
                now
            ],
        )?;
        Ok(())
    }

    pub fn subscription_for(&self, owner_id: &str) -> Result<Option<Subscription>> {
        let db = self.lock();
        let row = db.query_row(
            "SELECT owner_id, status, current_period_end, updated_at
             FROM subscriptions WHERE owner_id = ?1",
            rusqlite::params![owner_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );
        match row {
            Ok((owner_id, status, current_period_end, updated_at)) => {
                let status = status.parse::<SubscriptionStatus>().map_err(|reason| DeploymentError::Corrupt {
                    id: owner_id.clone(),
                    reason,
                })?;
                Ok(Some(Subscription {
                    owner_id,
                    status,
                    current_period_end,
                    updated_at,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DeploymentError::Database(e)),
        }
    }

    /// Suspend every subscription whose period ended more than `grace` before
    /// `now`, and every active deployment owned by those subscribers.
    ///
    /// Idempotent: already-suspended subscriptions are not selected again, so
    /// a second pass with the same inputs reports nothing.
    #[instrument(skip(self))]
    pub fn suspend_expired(&self, now: DateTime<Utc>, grace: Duration) -> Result<SuspendReport> {
        let cutoff = timestamp(now - grace);
        let stamp = timestamp(now);

        let mut db = self.lock();
        let tx = db.transaction()?;

        let owners: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT owner_id FROM subscriptions
                 WHERE status != 'suspended' AND current_period_end < ?1
                 ORDER BY owner_id",
            )?;
            let rows = stmt.query_map(rusqlite::params![cutoff], |row| row.get(0))?;
            let owners = rows.collect::<rusqlite::Result<Vec<String>>>()?;
            owners
        };

        let mut deployments = 0;
        for owner in &owners {
            tx.execute(
                "UPDATE subscriptions SET status = 'suspended', updated_at = ?1
                 WHERE owner_id = ?2",
                rusqlite::params![stamp, owner],
            )?;
            deployments += tx.execute(
                "UPDATE deployments SET status = 'suspended', updated_at = ?1
                 WHERE owner_id = ?2 AND status = 'active'",
                rusqlite::params![stamp, owner],
            )?;
        }
        tx.commit()?;

        debug!(owners = owners.len(), deployments, "suspension pass finished");
        Ok(SuspendReport { owners, deployments })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fixed-width UTC timestamps so string comparison in SQL is chronological.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn encode<T: serde::Serialize>(id: &DeploymentId, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| DeploymentError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Columns as stored, before the JSON columns are decoded.
struct RawDeployment {
    id: String,
    owner_id: String,
    name: String,
    status: String,
    agent: String,
    channel: String,
    created_at: String,
    updated_at: String,
}

impl RawDeployment {
    fn decode(self) -> Result<Deployment> {
        let corrupt = |reason: String| DeploymentError::Corrupt {
            id: self.id.clone(),
            reason,
        };
        let status = self.status.parse::<DeploymentStatus>().map_err(corrupt)?;
        let agent = serde_json::from_str(&self.agent).map_err(|e| corrupt(e.to_string()))?;
        let channel = serde_json::from_str(&self.channel).map_err(|e| corrupt(e.to_string()))?;
        Ok(Deployment {
            id: DeploymentId(self.id),
            owner_id: self.owner_id,
            name: self.name,
            status,
            agent,
            channel,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDeployment> {
    Ok(RawDeployment {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        agent: row.get(4)?,
        channel: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use flowbot_core::{WorkflowSpec, WorkflowStep, WorkflowTrigger};

    fn manager() -> DeploymentManager {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        DeploymentManager::new(conn)
    }

    fn agent() -> AgentProfile {
        AgentProfile::from_workflow(WorkflowSpec {
            name: "Support".to_string(),
            description: "customer support".to_string(),
            trigger: WorkflowTrigger {
                label: "message".to_string(),
                description: String::new(),
            },
            steps: vec![WorkflowStep::new("Analyze", "analyze customer intent")],
        })
    }

    fn api_channel() -> ChannelConfig {
        ChannelConfig::Api {
            api_key: "key-1".to_string(),
        }
    }

    #[test]
    fn create_then_get_round_trips_typed_config() {
        let mgr = manager();
        let created = mgr.create("owner-1", "Support", agent(), api_channel()).unwrap();
        let loaded = mgr.get(created.id.as_str()).unwrap().unwrap();
        assert_eq!(loaded.channel, api_channel());
        assert_eq!(loaded.agent, agent());
        assert!(loaded.is_active());
    }

    #[test]
    fn create_rejects_invalid_channel() {
        let mgr = manager();
        let err = mgr
            .create("o", "n", agent(), ChannelConfig::Api { api_key: String::new() })
            .unwrap_err();
        assert!(matches!(err, DeploymentError::InvalidConfig(_)));
    }

    #[test]
    fn get_active_distinguishes_missing_and_paused() {
        let mgr = manager();
        assert!(matches!(
            mgr.get_active("nope"),
            Err(DeploymentError::NotFound { .. })
        ));

        let d = mgr.create("o", "n", agent(), api_channel()).unwrap();
        mgr.set_status(d.id.as_str(), DeploymentStatus::Paused).unwrap();
        match mgr.get_active(d.id.as_str()) {
            Err(DeploymentError::Inactive { status, .. }) => assert_eq!(status, "paused"),
            other => panic!("expected Inactive, got {other:?}"),
        }
    }

    #[test]
    fn suspend_expired_is_idempotent() {
        let mgr = manager();
        let now = Utc::now();
        let lapsed = mgr.create("lapsed", "a", agent(), api_channel()).unwrap();
        let paying = mgr.create("paying", "b", agent(), api_channel()).unwrap();
        mgr.upsert_subscription("lapsed", SubscriptionStatus::PastDue, now - Duration::days(10))
            .unwrap();
        mgr.upsert_subscription("paying", SubscriptionStatus::Active, now + Duration::days(10))
            .unwrap();

        let first = mgr.suspend_expired(now, Duration::hours(72)).unwrap();
        assert_eq!(first.owners, vec!["lapsed".to_string()]);
        assert_eq!(first.deployments, 1);

        let second = mgr.suspend_expired(now, Duration::hours(72)).unwrap();
        assert!(second.is_empty());

        assert_eq!(
            mgr.get(lapsed.id.as_str()).unwrap().unwrap().status,
            DeploymentStatus::Suspended
        );
        assert!(mgr.get(paying.id.as_str()).unwrap().unwrap().is_active());
        assert_eq!(
            mgr.subscription_for("lapsed").unwrap().unwrap().status,
            SubscriptionStatus::Suspended
        );
    }

    #[test]
    fn grace_period_delays_suspension() {
        let mgr = manager();
        let now = Utc::now();
        mgr.create("late", "a", agent(), api_channel()).unwrap();
        mgr.upsert_subscription("late", SubscriptionStatus::PastDue, now - Duration::hours(1))
            .unwrap();

        let report = mgr.suspend_expired(now, Duration::hours(72)).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn paused_deployments_stay_paused_after_suspension() {
        let mgr = manager();
        let now = Utc::now();
        let d = mgr.create("o", "a", agent(), api_channel()).unwrap();
        mgr.set_status(d.id.as_str(), DeploymentStatus::Paused).unwrap();
        mgr.upsert_subscription("o", SubscriptionStatus::Canceled, now - Duration::days(30))
            .unwrap();

        let report = mgr.suspend_expired(now, Duration::hours(0)).unwrap();
        assert_eq!(report.deployments, 0);
        assert_eq!(
            mgr.get(d.id.as_str()).unwrap().unwrap().status,
            DeploymentStatus::Paused
        );
    }
}
