use rusqlite::Connection;

use crate::error::Result;

/// Initialise the deployments and subscriptions tables.
///
/// Safe to call on every startup: every statement is `IF NOT EXISTS`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS deployments (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL,
            name        TEXT NOT NULL,
            platform    TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'active',
            agent       TEXT NOT NULL,
            channel     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_deployments_owner
            ON deployments(owner_id, updated_at DESC);
        CREATE TABLE IF NOT EXISTS subscriptions (
            owner_id            TEXT PRIMARY KEY,
            status              TEXT NOT NULL,
            current_period_end  TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );",
    )?;
    Ok(())
}
