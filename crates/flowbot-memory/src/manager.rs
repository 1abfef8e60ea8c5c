use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::error::MemoryError;
use crate::types::*;

/// Persists conversation turns and message logs.
///
/// Thread-safe: wraps one SQLite connection in a Mutex. Writes are plain
/// appends, so two requests for the same conversation running at once can
/// interleave their turns; ordering is whatever order the inserts land in.
pub struct MemoryManager {
    db: Mutex<Connection>,
}

impl MemoryManager {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Append one conversation turn.
    #[instrument(skip(self, msg), fields(key = %msg.conversation_key, role = %msg.role))]
    pub fn save_message(&self, msg: &ConversationMessage) -> Result<(), MemoryError> {
        let db = self.lock();
        db.execute(
            "INSERT INTO conversations
             (conversation_key, deployment_id, user_id, platform, role, content,
              model_used, tokens_in, tokens_out, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                msg.conversation_key,
                msg.deployment_id,
                msg.user_id,
                msg.platform,
                msg.role,
                msg.content,
                msg.model_used,
                msg.tokens_in,
                msg.tokens_out,
                msg.created_at,
            ],
        )?;
        Ok(())
    }

    /// The most recent `limit` turns of a conversation, oldest first.
    pub fn get_history(
        &self,
        conversation_key: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, MemoryError> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT id, conversation_key, deployment_id, user_id, platform, role,
                    content, model_used, tokens_in, tokens_out, created_at
             FROM conversations
             WHERE conversation_key = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![conversation_key, limit as i64], |row| {
            Ok(ConversationMessage {
                id: row.get(0)?,
                conversation_key: row.get(1)?,
                deployment_id: row.get(2)?,
                user_id: row.get(3)?,
                platform: row.get(4)?,
                role: row.get(5)?,
                content: row.get(6)?,
                model_used: row.get(7)?,
                tokens_in: row.get(8)?,
                tokens_out: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;
        // Reverse so oldest first
        let mut msgs: Vec<_> = rows.filter_map(|r| r.ok()).collect();
        msgs.reverse();
        debug!(key = conversation_key, count = msgs.len(), "history loaded");
        Ok(msgs)
    }

    /// Append a message-log row. Returns the new row id.
    #[instrument(skip(self, log), fields(deployment = %log.deployment_id, direction = %log.direction))]
    pub fn log_message(&self, log: &MessageLog) -> Result<i64, MemoryError> {
        let db = self.lock();
        db.execute(
            "INSERT INTO message_logs
             (deployment_id, user_id, platform, chat_id, direction, content,
              error, elapsed_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                log.deployment_id,
                log.user_id,
                log.platform,
                log.chat_id,
                log.direction.to_string(),
                log.content,
                log.error,
                log.elapsed_ms.map(|ms| ms as i64),
                log.created_at,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Latest message logs for a deployment, newest first.
    pub fn recent_logs(
        &self,
        deployment_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageLog>, MemoryError> {
        let db = self.lock();
        let mut stmt = db.prepare(
            "SELECT id, deployment_id, user_id, platform, chat_id, direction,
                    content, error, elapsed_ms, created_at
             FROM message_logs
             WHERE deployment_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![deployment_id, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, Option<String>>(7)?,
                row.get::<_, Option<i64>>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (id, deployment_id, user_id, platform, chat_id, dir, content, error, elapsed, created_at) =
                row?;
            let direction: Direction = dir.parse().map_err(MemoryError::Corrupt)?;
            logs.push(MessageLog {
                id,
                deployment_id,
                user_id,
                platform,
                chat_id,
                direction,
                content,
                error,
                elapsed_ms: elapsed.map(|ms| ms as u64),
                created_at,
            });
        }
        Ok(logs)
    }

    /// A poisoned lock only means another thread panicked mid-query; the
    /// connection itself is still usable.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn manager() -> MemoryManager {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        MemoryManager::new(conn)
    }

    fn turn(key: &str, role: &str, content: &str, at: &str) -> ConversationMessage {
        ConversationMessage {
            id: 0,
            conversation_key: key.to_string(),
            deployment_id: "dep".to_string(),
            user_id: "u1".to_string(),
            platform: "api".to_string(),
            role: role.to_string(),
            content: content.to_string(),
            model_used: None,
            tokens_in: 0,
            tokens_out: 0,
            created_at: at.to_string(),
        }
    }

    #[test]
    fn history_returns_most_recent_window_oldest_first() {
        let mem = manager();
        for i in 0..15 {
            let at = format!("2026-01-01T00:00:{:02}Z", i);
            mem.save_message(&turn("k", "user", &format!("m{i}"), &at)).unwrap();
        }
        mem.save_message(&turn("other", "user", "noise", "2026-01-01T00:01:00Z"))
            .unwrap();

        let history = mem.get_history("k", 10).unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history.first().unwrap().content, "m5");
        assert_eq!(history.last().unwrap().content, "m14");
    }

    #[test]
    fn same_timestamp_keeps_insert_order() {
        let mem = manager();
        let at = "2026-01-01T00:00:00Z";
        mem.save_message(&turn("k", "user", "question", at)).unwrap();
        mem.save_message(&turn("k", "assistant", "answer", at)).unwrap();

        let history = mem.get_history("k", 10).unwrap();
        let roles: Vec<_> = history.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["user", "assistant"]);
    }

    #[test]
    fn logs_round_trip_with_direction() {
        let mem = manager();
        let base = MessageLog {
            id: 0,
            deployment_id: "dep".to_string(),
            user_id: "u1".to_string(),
            platform: "telegram".to_string(),
            chat_id: Some("99".to_string()),
            direction: Direction::Inbound,
            content: "hi".to_string(),
            error: None,
            elapsed_ms: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        mem.log_message(&base).unwrap();
        mem.log_message(&MessageLog {
            direction: Direction::Outbound,
            content: "hello!".to_string(),
            elapsed_ms: Some(120),
            created_at: "2026-01-01T00:00:01Z".to_string(),
            ..base.clone()
        })
        .unwrap();

        let logs = mem.recent_logs("dep", 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].direction, Direction::Outbound);
        assert_eq!(logs[0].elapsed_ms, Some(120));
        assert_eq!(logs[1].chat_id.as_deref(), Some("99"));
    }
}
