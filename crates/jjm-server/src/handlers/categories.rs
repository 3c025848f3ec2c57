//! Category handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{parse_body, required_text, IdQuery};
use crate::{AppError, AppState, SuccessResponse};
use jjm_core::models::{Category, EntryType, NewCategory};

/// Request body for creating or replacing a category
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl CategoryRequest {
    fn into_new_category(self) -> Result<NewCategory, AppError> {
        let name = required_text(self.name, "Nama kategori wajib diisi")?;
        let kind = self
            .kind
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| EntryType::Expense.to_string());

        Ok(NewCategory {
            name,
            color: self.color.filter(|c| !c.trim().is_empty()),
            kind,
        })
    }
}

/// GET /api/categories - List all categories by name
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state.db.list_categories()?;
    Ok(Json(categories))
}

/// POST /api/categories - Create a category (type defaults to expense)
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let req: CategoryRequest = parse_body(&body)?;
    let category = req.into_new_category()?;

    let id = state.db.insert_category(&category)?;
    info!(id = %id, name = %category.name, "Category created");

    Ok((
        StatusCode::CREATED,
        Json(Category {
            id,
            name: category.name,
            color: category.color,
            kind: category.kind,
        }),
    ))
}

/// PUT /api/categories?id= - Replace a category
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = query.require()?;
    let req: CategoryRequest = parse_body(&body)?;
    let category = req.into_new_category()?;

    // Renaming leaves transactions pointing at the old name
    if let Some(existing) = state.db.get_category(id)? {
        if existing.name != category.name {
            let orphaned = state.db.count_transactions_in_category(&existing.name)?;
            if orphaned > 0 {
                warn!(
                    id = %id,
                    from = %existing.name,
                    to = %category.name,
                    transactions = orphaned,
                    "Category renamed while transactions still use the old name"
                );
            }
        }
    }

    let updated = state.db.update_category(id, &category)?;
    if updated == 0 {
        debug!(id = %id, "Update matched no category");
    } else {
        info!(id = %id, "Category updated");
    }

    Ok(SuccessResponse::ok())
}

/// DELETE /api/categories?id= - Delete a category; transactions keep their text
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    let id = query.require()?;

    if let Some(existing) = state.db.get_category(id)? {
        let referencing = state.db.count_transactions_in_category(&existing.name)?;
        if referencing > 0 {
            warn!(
                id = %id,
                name = %existing.name,
                transactions = referencing,
                "Deleting a category that transactions still reference"
            );
        }
    }

    let deleted = state.db.delete_category(id)?;
    if deleted == 0 {
        debug!(id = %id, "Delete matched no category");
    } else {
        info!(id = %id, "Category deleted");
    }

    Ok(SuccessResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_type_defaults_to_expense() {
        let req = CategoryRequest {
            name: Some("Food".to_string()),
            color: None,
            kind: None,
        };
        let category = req.into_new_category().unwrap();
        assert_eq!(category.kind, "expense");

        let req = CategoryRequest {
            name: Some("Salary".to_string()),
            color: Some("#00ff00".to_string()),
            kind: Some("income".to_string()),
        };
        let category = req.into_new_category().unwrap();
        assert_eq!(category.kind, "income");
        assert_eq!(category.color.as_deref(), Some("#00ff00"));
    }

    #[test]
    fn test_category_requires_name() {
        let req = CategoryRequest {
            name: Some("  ".to_string()),
            color: None,
            kind: None,
        };
        assert!(req.into_new_category().is_err());
    }
}
