//! PIN login handlers
//!
//! There are no sessions or tokens: the UI calls login, and on success shows
//! the app. The settings table is ensured before every check so a fresh
//! database still accepts the default PINs.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::parse_body;
use crate::{AppError, AppState};
use jjm_core::is_valid_pin;

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub pin: Option<Value>,
}

/// Request body for changing the primary PIN
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePinRequest {
    pub current_pin: Option<Value>,
    pub new_pin: Option<Value>,
}

/// Response for login and change PIN
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// Response for the auth status ping
#[derive(Serialize)]
pub struct AuthStatus {
    pub status: String,
    pub time: String,
}

/// PIN as text; JSON numbers are accepted the way a keypad UI may send them
fn pin_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// GET /api/auth - Status ping, does not touch the store
pub async fn auth_status() -> Json<AuthStatus> {
    Json(AuthStatus {
        status: "auth ready".to_string(),
        time: chrono::Utc::now().to_rfc3339(),
    })
}

/// POST /api/auth - Check a PIN against the primary and backup PINs
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AuthResponse>, AppError> {
    let req: LoginRequest = parse_body(&body)?;
    let pin = pin_text(req.pin.as_ref());

    if !is_valid_pin(&pin) {
        return Err(AppError::bad_request("PIN harus 4 digit angka"));
    }

    state.db.ensure_settings(&state.config.pins)?;

    if !state.db.verify_pin(&pin)? {
        info!("Login rejected");
        return Err(AppError::unauthorized("PIN salah"));
    }

    info!("Login accepted");
    Ok(Json(AuthResponse {
        success: true,
        message: "Login berhasil".to_string(),
    }))
}

/// PUT /api/auth - Replace the primary PIN; the backup PIN never changes
pub async fn change_pin(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<AuthResponse>, AppError> {
    let req: ChangePinRequest = parse_body(&body)?;
    let current_pin = pin_text(req.current_pin.as_ref());
    let new_pin = pin_text(req.new_pin.as_ref());

    if !is_valid_pin(&new_pin) {
        return Err(AppError::bad_request("PIN baru harus 4 digit angka"));
    }

    state.db.ensure_settings(&state.config.pins)?;

    if !state.db.verify_pin(&current_pin)? {
        info!("PIN change rejected");
        return Err(AppError::unauthorized("PIN saat ini salah"));
    }

    state.db.set_primary_pin(&new_pin)?;
    info!("Primary PIN changed");

    Ok(Json(AuthResponse {
        success: true,
        message: "PIN berhasil diubah".to_string(),
    }))
}
