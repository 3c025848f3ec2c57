//! HTTP request handlers organized by resource
//!
//! Each submodule contains handlers for one path under `/api`. Bodies arrive
//! as raw bytes and are decoded here so malformed JSON becomes a 400 with the
//! usual `{success:false, error}` shape.

pub mod auth;
pub mod categories;
pub mod chat;
pub mod diagnostics;
pub mod transactions;

// Re-export all handlers for use in router
pub use auth::*;
pub use categories::*;
pub use chat::*;
pub use diagnostics::*;
pub use transactions::*;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::AppError;

/// `?id=` on PUT and DELETE
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    /// The id as a number, or a 400
    pub fn require(&self) -> Result<i64, AppError> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::bad_request("Parameter id wajib diisi"))?
            .parse::<i64>()
            .map_err(|_| AppError::bad_request("Parameter id harus berupa angka"))
    }
}

/// Decode a JSON request body
pub(crate) fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(bytes).map_err(|_| AppError::bad_request("Body JSON tidak valid"))
}

/// Trimmed, non-empty text field
pub(crate) fn required_text(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(message))
}
