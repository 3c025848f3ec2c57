//! Settings operations (PIN storage)

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Setting, BACKUP_PIN_KEY, USER_PIN_KEY};
use crate::pin::PinDefaults;

impl Database {
    /// Create the settings table if needed and seed both PINs.
    ///
    /// Insert-if-absent: existing values are never overwritten, so calling
    /// this before every PIN check is safe.
    pub fn ensure_settings(&self, defaults: &PinDefaults) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY,
                key_name TEXT NOT NULL UNIQUE,
                value TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        let mut seeded = 0;
        for (key, value) in [
            (USER_PIN_KEY, defaults.primary.as_str()),
            (BACKUP_PIN_KEY, defaults.backup.as_str()),
        ] {
            seeded += conn.execute(
                "INSERT OR IGNORE INTO settings (key_name, value) VALUES (?, ?)",
                params![key, value],
            )?;
        }

        if seeded > 0 {
            debug!(seeded, "Seeded PIN settings");
        }
        Ok(())
    }

    /// Get a settings row by key
    pub fn get_setting(&self, key: &str) -> Result<Option<Setting>> {
        let conn = self.conn()?;
        let setting = conn
            .query_row(
                "SELECT key_name, COALESCE(value, ''), updated_at FROM settings WHERE key_name = ?",
                params![key],
                |row| {
                    let updated_at: String = row.get(2)?;
                    Ok(Setting {
                        key_name: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: parse_datetime(&updated_at),
                    })
                },
            )
            .optional()?;
        Ok(setting)
    }

    /// True if `candidate` equals the primary or the backup PIN
    pub fn verify_pin(&self, candidate: &str) -> Result<bool> {
        if candidate.is_empty() {
            return Ok(false);
        }

        let conn = self.conn()?;
        let matches: i64 = conn.query_row(
            "SELECT COUNT(*) FROM settings WHERE key_name IN (?, ?) AND value = ?",
            params![USER_PIN_KEY, BACKUP_PIN_KEY, candidate],
            |row| row.get(0),
        )?;
        Ok(matches > 0)
    }

    /// Overwrite the primary PIN. The backup row is never touched.
    pub fn set_primary_pin(&self, new_pin: &str) -> Result<usize> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key_name = ?",
            params![new_pin, USER_PIN_KEY],
        )?;
        Ok(updated)
    }
}
