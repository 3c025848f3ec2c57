//! Aggregate queries for the chat context and report plans
//!
//! Date bounds are inclusive and compared as `YYYY-MM-DD` text.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::transactions::{row_to_transaction, TRANSACTION_COLUMNS};
use super::{parse_date, Database};
use crate::error::Result;
use crate::models::{CategoryTotal, DailyTotal, EntryType, PeriodSummary, Transaction};

const SUMMARY_COLUMNS: &str = r#"
    COALESCE(SUM(CASE WHEN type = 'income' THEN amount ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN type = 'expense' THEN amount ELSE 0 END), 0),
    COUNT(*)
"#;

impl Database {
    /// Income, expense and count for transactions dated within `from..=to`
    pub fn summarize_period(&self, from: NaiveDate, to: NaiveDate) -> Result<PeriodSummary> {
        let conn = self.conn()?;
        let summary = conn.query_row(
            &format!(
                "SELECT {} FROM transactions WHERE date BETWEEN ? AND ?",
                SUMMARY_COLUMNS
            ),
            params![from.to_string(), to.to_string()],
            |row| {
                Ok(PeriodSummary {
                    income: row.get(0)?,
                    expense: row.get(1)?,
                    count: row.get(2)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Income, expense and count across every transaction
    pub fn summarize_all_time(&self) -> Result<PeriodSummary> {
        let conn = self.conn()?;
        let summary = conn.query_row(
            &format!("SELECT {} FROM transactions", SUMMARY_COLUMNS),
            [],
            |row| {
                Ok(PeriodSummary {
                    income: row.get(0)?,
                    expense: row.get(1)?,
                    count: row.get(2)?,
                })
            },
        )?;
        Ok(summary)
    }

    /// Date of the oldest transaction, if any
    pub fn earliest_transaction_date(&self) -> Result<Option<NaiveDate>> {
        let conn = self.conn()?;
        let date: Option<String> =
            conn.query_row("SELECT MIN(date) FROM transactions", [], |row| row.get(0))?;
        Ok(date.map(|d| parse_date(&d)))
    }

    /// Per-day totals within `from..=to`, oldest day first. Days without
    /// transactions are absent.
    pub fn daily_totals(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT date, {} FROM transactions WHERE date BETWEEN ? AND ? GROUP BY date ORDER BY date",
            SUMMARY_COLUMNS
        ))?;

        let totals = stmt
            .query_map(params![from.to_string(), to.to_string()], |row| {
                let date_str: String = row.get(0)?;
                Ok(DailyTotal {
                    date: parse_date(&date_str),
                    income: row.get(1)?,
                    expense: row.get(2)?,
                    count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(totals)
    }

    /// Categories ranked by total amount for one entry type
    pub fn top_categories(
        &self,
        kind: EntryType,
        from: NaiveDate,
        to: NaiveDate,
        limit: i64,
    ) -> Result<Vec<CategoryTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT COALESCE(NULLIF(category, ''), 'Lainnya') AS cat, SUM(amount) AS total, COUNT(*)
            FROM transactions
            WHERE type = ? AND date BETWEEN ? AND ?
            GROUP BY cat
            ORDER BY total DESC, cat
            LIMIT ?
            "#,
        )?;

        let totals = stmt
            .query_map(
                params![kind.as_str(), from.to_string(), to.to_string(), limit],
                |row| {
                    Ok(CategoryTotal {
                        category: row.get(0)?,
                        total: row.get(1)?,
                        count: row.get(2)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(totals)
    }

    /// Transactions within `from..=to`, newest first, optionally filtered by type
    pub fn transactions_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        kind: Option<EntryType>,
        limit: i64,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions
             WHERE date BETWEEN ?1 AND ?2 AND (?3 IS NULL OR type = ?3)
             ORDER BY date DESC, id DESC LIMIT ?4",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(
                params![
                    from.to_string(),
                    to.to_string(),
                    kind.map(|k| k.as_str()),
                    limit
                ],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// The `limit` most recently dated transactions
    pub fn recent_transactions(&self, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY date DESC, id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// The single largest transaction of a type within `from..=to`
    pub fn largest_transaction(
        &self,
        kind: EntryType,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let transaction = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions
                     WHERE type = ? AND date BETWEEN ? AND ?
                     ORDER BY amount DESC, id DESC LIMIT 1",
                    TRANSACTION_COLUMNS
                ),
                params![kind.as_str(), from.to_string(), to.to_string()],
                row_to_transaction,
            )
            .optional()?;
        Ok(transaction)
    }
}
