//! Transaction operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction};

/// Column list matching `row_to_transaction`
pub(crate) const TRANSACTION_COLUMNS: &str = "id, title, amount, category, type, date, created_at";

/// Map a row selected with `TRANSACTION_COLUMNS`
pub(crate) fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    let category: Option<String> = row.get(3)?;
    let date_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    Ok(Transaction {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        category: category.unwrap_or_default(),
        kind: row.get(4)?,
        date: parse_date(&date_str),
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// List all transactions, newest first
    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY date DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map([], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let transaction = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
                params![id],
                row_to_transaction,
            )
            .optional()?;
        Ok(transaction)
    }

    /// Insert a transaction, returning its new ID
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO transactions (title, amount, category, type, date) VALUES (?, ?, ?, ?, ?)",
            params![
                tx.title,
                tx.amount,
                tx.category,
                tx.kind,
                tx.date.to_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Replace every editable field of a transaction.
    ///
    /// Returns the number of rows affected; zero when the ID doesn't exist.
    pub fn update_transaction(&self, id: i64, tx: &NewTransaction) -> Result<usize> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE transactions SET title = ?, amount = ?, category = ?, type = ?, date = ? WHERE id = ?",
            params![
                tx.title,
                tx.amount,
                tx.category,
                tx.kind,
                tx.date.to_string(),
                id
            ],
        )?;
        Ok(updated)
    }

    /// Delete a transaction. Returns rows affected; zero when the ID doesn't exist.
    pub fn delete_transaction(&self, id: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        Ok(deleted)
    }

    /// Number of transactions whose category string equals `category`
    pub fn count_transactions_in_category(&self, category: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE category = ?",
            params![category],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
