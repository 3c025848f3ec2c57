//! Health, ping and setup diagnostics

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::{AppError, AppState};

/// Environment variables reported by `/api/ping` (presence only, never values)
pub const PING_ENV_VARS: &[&str] = &[
    "JJM_DB",
    "JJM_CHAT_MODE",
    "JJM_MARKET_DATA",
    "AI_BACKEND",
    "OPENAI_COMPATIBLE_HOST",
    "OPENAI_COMPATIBLE_MODEL",
    "OPENAI_COMPATIBLE_API_KEY",
];

/// Response for `/api/ping`
#[derive(Serialize)]
pub struct PingResponse {
    pub pong: bool,
    pub time: String,
    pub env: BTreeMap<&'static str, &'static str>,
}

/// GET /api/ping - Liveness plus a config presence report
pub async fn ping() -> Json<PingResponse> {
    let env = PING_ENV_VARS
        .iter()
        .map(|name| {
            let present = std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false);
            (*name, if present { "Set" } else { "Missing" })
        })
        .collect();

    Json(PingResponse {
        pong: true,
        time: chrono::Utc::now().to_rfc3339(),
        env,
    })
}

/// GET /api/health - Round trip through the pool
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let ai = state
        .assistant
        .ai()
        .map(|client| client.backend_name())
        .unwrap_or("none");

    match state.db.ping() {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "db": "connected",
                "ai": ai,
                "chat_mode": state.assistant.mode().as_str(),
            })),
        ),
        Err(e) => {
            error!(error = %e, "Health check failed");
            let mut body = json!({
                "status": "error",
                "db": "disconnected",
            });
            if state.config.verbose_errors {
                body["error"] = json!(e.to_string());
            }
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
        }
    }
}

/// GET /api/setup - Create the settings table and seed PINs if absent
pub async fn setup(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    state.db.ensure_settings(&state.config.pins)?;
    info!("Database setup run");

    Ok(Json(json!({
        "success": true,
        "message": "Database setup completed successfully",
    })))
}

/// GET /api/debug-db - Probe the database file with a connection outside the pool
pub async fn debug_db(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.db.standalone_probe() {
        Ok(val) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Standalone connection successful",
                "result": { "val": val },
            })),
        ),
        Err(e) => {
            error!(error = %e, path = %state.db.path(), "Standalone connection failed");
            let detail = if state.config.verbose_errors {
                e.to_string()
            } else {
                "An internal error occurred".to_string()
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Connection failed",
                    "error": detail,
                })),
            )
        }
    }
}
