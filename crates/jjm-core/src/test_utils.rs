//! Test utilities for jjm-core
//!
//! A local axum server standing in for every upstream the assistant talks to:
//! the OpenAI-compatible completions endpoint and the four market data
//! sources. Market routes serve canned JSON; `/missing` always 404s, which
//! is handy for proving partial results.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

pub const MOCK_USD_IDR: f64 = 16_250.0;
pub const MOCK_GOLD_USD: f64 = 2_400.0;
pub const MOCK_BTC_USD: f64 = 65_000.0;
pub const MOCK_BTC_IDR: f64 = 1_056_250_000.0;
pub const MOCK_JKSE: f64 = 7_200.0;
pub const MOCK_JKSE_PREVIOUS: f64 = 7_100.0;

#[derive(Default)]
struct UpstreamState {
    /// `None` makes the completions endpoint answer 500
    completion: Option<String>,
    completion_requests: Vec<Value>,
    market_delay: Option<Duration>,
}

type SharedState = Arc<Mutex<UpstreamState>>;

/// Mock upstream server for testing
pub struct MockUpstreamServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockUpstreamServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(UpstreamState {
            completion: Some("Halo dari mock upstream".to_string()),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/v1/chat/completions", post(handle_completion))
            .route("/v1/models", get(handle_models))
            .route("/fx", get(handle_fx))
            .route("/gold", get(handle_gold))
            .route("/btc", get(handle_btc))
            .route("/index", get(handle_index))
            .route("/garbage", get(handle_garbage))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Reply content for subsequent completion calls
    pub async fn set_completion(&self, content: &str) {
        self.state.lock().await.completion = Some(content.to_string());
    }

    /// Make the completions endpoint answer 500
    pub async fn fail_completions(&self) {
        self.state.lock().await.completion = None;
    }

    /// Request bodies received by the completions endpoint
    pub async fn completion_requests(&self) -> Vec<Value> {
        self.state.lock().await.completion_requests.clone()
    }

    /// Delay every market response by `delay`
    pub async fn set_market_delay(&self, delay: Duration) {
        self.state.lock().await.market_delay = Some(delay);
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockUpstreamServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_completion(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().await;
    state.completion_requests.push(body.clone());

    match state.completion.clone() {
        Some(content) => Json(json!({
            "id": "chatcmpl-mock",
            "model": body["model"],
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "mock upstream failure" } })),
        )
            .into_response(),
    }
}

async fn handle_models() -> Json<Value> {
    Json(json!({ "data": [{ "id": "test-model" }] }))
}

async fn market_delay(state: &SharedState) {
    let delay = state.lock().await.market_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

async fn handle_fx(State(state): State<SharedState>) -> Json<Value> {
    market_delay(&state).await;
    Json(json!({
        "result": "success",
        "base_code": "USD",
        "rates": { "USD": 1.0, "IDR": MOCK_USD_IDR }
    }))
}

async fn handle_gold(State(state): State<SharedState>) -> Json<Value> {
    market_delay(&state).await;
    Json(json!({ "name": "Gold", "symbol": "XAU", "price": MOCK_GOLD_USD }))
}

async fn handle_btc(State(state): State<SharedState>) -> Json<Value> {
    market_delay(&state).await;
    Json(json!({ "bitcoin": { "usd": MOCK_BTC_USD, "idr": MOCK_BTC_IDR } }))
}

async fn handle_index(State(state): State<SharedState>) -> Json<Value> {
    market_delay(&state).await;
    Json(json!({
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "^JKSE",
                    "regularMarketPrice": MOCK_JKSE,
                    "chartPreviousClose": MOCK_JKSE_PREVIOUS
                }
            }],
            "error": null
        }
    }))
}

async fn handle_garbage() -> &'static str {
    "<html>not json</html>"
}
