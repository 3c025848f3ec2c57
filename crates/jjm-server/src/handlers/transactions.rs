//! Transaction handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{parse_body, required_text, IdQuery};
use crate::{AppError, AppState, SuccessResponse};
use jjm_core::models::{NewTransaction, Transaction};

/// Request body for creating or replacing a transaction
#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub title: Option<String>,
    /// Number or numeric string
    pub amount: Option<Value>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub date: Option<String>,
}

impl TransactionRequest {
    fn into_new_transaction(self) -> Result<NewTransaction, AppError> {
        let title = required_text(self.title, "Judul wajib diisi")?;
        let amount = parse_amount(self.amount.as_ref())?;
        let date = self
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
            .ok_or_else(|| AppError::bad_request("Tanggal harus berformat YYYY-MM-DD"))?;

        Ok(NewTransaction {
            title,
            amount,
            category: self.category.map(|c| c.trim().to_string()).unwrap_or_default(),
            kind: self.kind.unwrap_or_default(),
            date,
        })
    }
}

/// Created transaction as returned by POST
#[derive(Debug, Serialize)]
pub struct CreatedTransaction {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: NaiveDate,
}

/// Accept `25000`, `25000.5` or `"25000"`
fn parse_amount(value: Option<&Value>) -> Result<f64, AppError> {
    let amount = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    amount
        .filter(|a| a.is_finite())
        .ok_or_else(|| AppError::bad_request("Jumlah harus berupa angka"))
}

/// Soft reference check: unknown categories are logged, never rejected
fn warn_on_unknown_category(state: &AppState, category: &str) -> Result<(), AppError> {
    if !category.is_empty() && !state.db.category_exists(category)? {
        warn!(category = %category, "Transaction references a category that does not exist");
    }
    Ok(())
}

/// GET /api/transactions - List all transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = state.db.list_transactions()?;
    Ok(Json(transactions))
}

/// POST /api/transactions - Create a transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedTransaction>), AppError> {
    let req: TransactionRequest = parse_body(&body)?;
    let tx = req.into_new_transaction()?;

    warn_on_unknown_category(&state, &tx.category)?;

    let id = state.db.insert_transaction(&tx)?;
    info!(id = %id, kind = %tx.kind, "Transaction created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedTransaction {
            id,
            title: tx.title,
            amount: tx.amount,
            category: tx.category,
            kind: tx.kind,
            date: tx.date,
        }),
    ))
}

/// PUT /api/transactions?id= - Replace a transaction
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = query.require()?;
    let req: TransactionRequest = parse_body(&body)?;
    let tx = req.into_new_transaction()?;

    warn_on_unknown_category(&state, &tx.category)?;

    let updated = state.db.update_transaction(id, &tx)?;
    if updated == 0 {
        debug!(id = %id, "Update matched no transaction");
    } else {
        info!(id = %id, "Transaction updated");
    }

    Ok(SuccessResponse::ok())
}

/// DELETE /api/transactions?id= - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = query.require()?;

    let deleted = state.db.delete_transaction(id)?;
    if deleted == 0 {
        debug!(id = %id, "Delete matched no transaction");
    } else {
        info!(id = %id, "Transaction deleted");
    }

    Ok(SuccessResponse::ok())
}
