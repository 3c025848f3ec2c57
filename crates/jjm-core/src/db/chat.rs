//! Chat history operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{ChatMessage, ChatRole};

/// Number of messages returned by the history endpoint
pub const CHAT_HISTORY_LIMIT: i64 = 50;

impl Database {
    /// Append a chat message, returning its ID
    pub fn insert_chat_message(&self, role: ChatRole, content: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_messages (role, content) VALUES (?, ?)",
            params![role.as_str(), content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The most recent `limit` messages, oldest first.
    ///
    /// `created_at` has one-second resolution, so `id` breaks ties.
    pub fn recent_chat_messages(&self, limit: i64) -> Result<Vec<ChatMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, role, content, created_at FROM chat_messages
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )?;

        let mut messages = stmt
            .query_map(params![limit], |row| {
                let role_str: String = row.get(1)?;
                let created_at_str: String = row.get(3)?;
                Ok(ChatMessage {
                    id: row.get(0)?,
                    role: role_str.parse().unwrap_or(ChatRole::User),
                    content: row.get(2)?,
                    created_at: parse_datetime(&created_at_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        messages.reverse();
        Ok(messages)
    }

    /// Delete every chat message, returning how many were removed
    pub fn clear_chat_messages(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM chat_messages", [])?;
        Ok(deleted)
    }

    /// Total number of stored chat messages
    pub fn count_chat_messages(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?;
        Ok(count)
    }
}
