//! JJM Web Server
//!
//! Axum-based REST API for the JJM personal finance tracker.
//!
//! - PIN login gate over the settings table
//! - CRUD for transactions and categories
//! - Chat endpoint backed by the assistant in `jjm-core`
//! - Health, ping and setup diagnostics
//! - Sanitized error responses unless verbose errors are enabled

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use jjm_core::{
    AIBackend, AIClient, Assistant, ChatMode, Database, MarketClient, MarketConfig, PinDefaults,
};

mod handlers;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Put raw error text in 500 bodies and chat fallbacks
    pub verbose_errors: bool,
    /// Allowed CORS origins (empty = any origin)
    pub allowed_origins: Vec<String>,
    /// PINs seeded into the settings table
    pub pins: PinDefaults,
    pub chat_mode: ChatMode,
    /// Market data enrichment for chat, disabled when `None`
    pub market: Option<MarketConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            verbose_errors: false,
            allowed_origins: vec![],
            pins: PinDefaults::default(),
            chat_mode: ChatMode::default(),
            market: None,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub assistant: Assistant,
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let ai = AIClient::from_env();
    create_router_with_options(db, static_dir, config, ai)
}

/// Create the application router with an explicit AI client (for testing)
pub fn create_router_with_options(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    ai: Option<AIClient>,
) -> Router {
    match ai {
        Some(ref client) => info!(
            "AI backend configured: {} ({}, model: {})",
            client.backend_name(),
            client.host(),
            client.model()
        ),
        None => info!(
            "ℹ️  AI backend not configured (set OPENAI_COMPATIBLE_API_KEY to enable chat)"
        ),
    }
    info!(mode = %config.chat_mode, "Chat mode");

    let mut assistant = Assistant::new(db.clone(), ai, config.chat_mode);
    if let Some(market) = config.market.clone() {
        info!(timeout = ?market.timeout, "Market data enrichment enabled");
        assistant = assistant.with_market(MarketClient::new(market));
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        assistant,
    });

    let api_routes = Router::new()
        // Auth
        .route(
            "/auth",
            get(handlers::auth_status)
                .post(handlers::login)
                .put(handlers::change_pin)
                .fallback(method_not_allowed),
        )
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions)
                .post(handlers::create_transaction)
                .put(handlers::update_transaction)
                .delete(handlers::delete_transaction)
                .fallback(method_not_allowed),
        )
        // Categories
        .route(
            "/categories",
            get(handlers::list_categories)
                .post(handlers::create_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category)
                .fallback(method_not_allowed),
        )
        // Chat
        .route(
            "/chat",
            get(handlers::chat_history)
                .post(handlers::post_chat_message)
                .delete(handlers::clear_chat_history)
                .fallback(method_not_allowed),
        )
        // Diagnostics
        .route("/ping", get(handlers::ping).fallback(method_not_allowed))
        .route("/health", get(handlers::health).fallback(method_not_allowed))
        .route("/setup", get(handlers::setup).fallback(method_not_allowed))
        .route(
            "/debug-db",
            get(handlers::debug_db).fallback(method_not_allowed),
        );

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error_detail_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    // Serve the prebuilt UI if a directory was provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if config.verbose_errors {
        warn!("⚠️  Verbose errors enabled - raw error text is sent to clients");
    }

    db.ensure_settings(&config.pins)?;

    let ai = AIClient::from_env();
    check_ai_connection(ai.as_ref()).await;

    let app = create_router_with_options(db, static_dir, config, ai);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(ai: Option<&AIClient>) {
    let Some(client) = ai else {
        return;
    };

    if client.health_check().await {
        info!(
            "✅ AI backend connected: {} (model: {})",
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "⚠️  AI backend configured but not responding: {} (model: {})",
            client.host(),
            client.model()
        );
    }
}

/// Fallback for unsupported methods on a known path
async fn method_not_allowed() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
}

// ============================================================================
// Error Handling
// ============================================================================

/// Raw internal error text attached to a response by `AppError`
#[derive(Clone)]
struct ErrorDetail(String);

/// Swap the generic 500 message for the raw error when verbose errors are on
async fn error_detail_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.config.verbose_errors {
        return response;
    }

    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let status = response.status();
    let body = Json(serde_json::json!({
        "success": false,
        "error": format!("Server error: {}", detail)
    }));
    (status, body).into_response()
}

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message
        }));
        let mut response = (self.status, body).into_response();

        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
            response
                .extensions_mut()
                .insert(ErrorDetail(format!("{:#}", err)));
        }

        response
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
