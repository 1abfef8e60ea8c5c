use rusqlite::{Connection, Result};

/// Initialise history and log tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_conversations_table(conn)?;
    create_message_logs_table(conn)?;
    Ok(())
}

fn create_conversations_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_key TEXT NOT NULL,
            deployment_id    TEXT NOT NULL,
            user_id          TEXT NOT NULL,
            platform         TEXT NOT NULL,
            role             TEXT NOT NULL,
            content          TEXT NOT NULL,
            model_used       TEXT,
            tokens_in        INTEGER NOT NULL DEFAULT 0,
            tokens_out       INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conv_key
            ON conversations(conversation_key, created_at);",
    )
}

/// One row per message crossing the channel boundary, in either direction.
fn create_message_logs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS message_logs (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            deployment_id TEXT NOT NULL,
            user_id       TEXT NOT NULL,
            platform      TEXT NOT NULL,
            chat_id       TEXT,
            direction     TEXT NOT NULL,
            content       TEXT NOT NULL,
            error         TEXT,
            elapsed_ms    INTEGER,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_logs_deployment
            ON message_logs(deployment_id, created_at DESC);",
    )
}
