//! Category operations

use rusqlite::{params, OptionalExtension, Row};

use super::Database;
use crate::error::Result;
use crate::models::{Category, NewCategory};

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        kind: row.get(3)?,
    })
}

impl Database {
    /// List all categories by name
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, color, type FROM categories ORDER BY name, id")?;

        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    /// Get a category by ID
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, color, type FROM categories WHERE id = ?",
                params![id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// True if at least one category carries this exact name
    pub fn category_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE name = ?",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a category, returning its new ID
    pub fn insert_category(&self, category: &NewCategory) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (name, color, type) VALUES (?, ?, ?)",
            params![category.name, category.color, category.kind],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Replace a category's fields. Returns rows affected.
    ///
    /// Transactions keep the old category string if the name changes.
    pub fn update_category(&self, id: i64, category: &NewCategory) -> Result<usize> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE categories SET name = ?, color = ?, type = ? WHERE id = ?",
            params![category.name, category.color, category.kind, id],
        )?;
        Ok(updated)
    }

    /// Delete a category. Returns rows affected.
    pub fn delete_category(&self, id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM categories WHERE id = ?", params![id])?;
        Ok(deleted)
    }
}
