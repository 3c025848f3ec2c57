//! Chat handlers
//!
//! A chat turn persists the user's message, asks the assistant for a reply
//! and persists that too. Upstream trouble never fails the request: the
//! assistant answers with its apology and the turn still returns 200.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::parse_body;
use crate::{AppError, AppState, SuccessResponse};
use jjm_core::models::{ChatMessage, ChatRole};
use jjm_core::CHAT_HISTORY_LIMIT;

/// Request body for a chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    /// Extra context supplied by the client, appended to the system prompt
    pub context: Option<String>,
}

/// Response for a chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    /// Upstream error detail, only with verbose errors enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

/// GET /api/chat - Recent history, oldest first
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>, AppError> {
    let messages = state.db.recent_chat_messages(CHAT_HISTORY_LIMIT)?;
    Ok(Json(messages))
}

/// POST /api/chat - Send a message to the assistant
pub async fn post_chat_message(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    let req: ChatRequest = parse_body(&body)?;
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Pesan tidak boleh kosong"))?;
    let note = req.context.filter(|c| !c.trim().is_empty());

    state.db.insert_chat_message(ChatRole::User, &message)?;

    let today = chrono::Local::now().date_naive();
    let reply = state
        .assistant
        .reply(&message, note.as_deref(), today)
        .await;

    if reply.is_apology() {
        warn!(
            detail = reply.debug.as_deref().unwrap_or("unknown"),
            "Chat turn answered with apology"
        );
    } else {
        info!(
            grounded = reply.grounded,
            chars = reply.text.len(),
            "Chat turn answered"
        );
    }

    state.db.insert_chat_message(ChatRole::Assistant, &reply.text)?;

    let debug = if state.config.verbose_errors {
        reply.debug
    } else {
        None
    };

    Ok(Json(ChatResponse {
        response: reply.text,
        debug,
    }))
}

/// DELETE /api/chat - Clear all history
pub async fn clear_chat_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, AppError> {
    let removed = state.db.clear_chat_messages()?;
    info!(removed = removed, "Chat history cleared");
    Ok(SuccessResponse::ok())
}
