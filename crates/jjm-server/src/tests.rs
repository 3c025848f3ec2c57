//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use jjm_core::models::{ChatRole, NewCategory};
use jjm_core::{MockBackend, APOLOGY};
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig::default()
}

fn setup_test_app() -> Router {
    let db = Database::in_memory().unwrap();
    create_router_with_options(db, None, test_config(), Some(AIClient::mock()))
}

fn setup_test_app_with(db: Database, config: ServerConfig, ai: Option<AIClient>) -> Router {
    create_router_with_options(db, None, config, ai)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn coffee() -> serde_json::Value {
    serde_json::json!({
        "title": "Coffee",
        "amount": 25000,
        "category": "Food",
        "type": "expense",
        "date": "2024-01-15"
    })
}

// ========== Auth API Tests ==========

#[tokio::test]
async fn test_auth_status_ping() {
    let app = setup_test_app();

    let response = app.oneshot(empty_request("GET", "/api/auth")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["status"].is_string());
    assert!(json["time"].is_string());
}

#[tokio::test]
async fn test_login_with_default_pins() {
    let app = setup_test_app();

    for pin in ["1234", "0000"] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth", serde_json::json!({ "pin": pin })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK, "pin {}", pin);
        let json = get_body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Login berhasil");
    }
}

#[tokio::test]
async fn test_login_wrong_pin() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "pin": "5678" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "PIN salah");
}

#[tokio::test]
async fn test_login_rejects_malformed_pins() {
    let app = setup_test_app();

    for body in [
        serde_json::json!({ "pin": "12a4" }),
        serde_json::json!({ "pin": "12345" }),
        serde_json::json!({ "pin": "" }),
        serde_json::json!({ "pin": null }),
        serde_json::json!({}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth", body.clone()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let json = get_body_json(response).await;
        assert_eq!(json["error"], "PIN harus 4 digit angka");
    }
}

#[tokio::test]
async fn test_login_invalid_json() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_login_seeds_settings_lazily() {
    let db = Database::in_memory().unwrap();
    db.conn()
        .unwrap()
        .execute_batch("DROP TABLE settings")
        .unwrap();
    let app = setup_test_app_with(db, test_config(), None);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "pin": "1234" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_uses_configured_pins() {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        pins: PinDefaults::new("4321", "8888").unwrap(),
        ..Default::default()
    };
    let app = setup_test_app_with(db, config, None);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "pin": "8888" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "pin": "1234" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_pin_flow() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/auth",
            serde_json::json!({ "currentPin": "1234", "newPin": "9999" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);

    let login = |pin: &'static str| {
        let app = app.clone();
        async move {
            app.oneshot(json_request(
                "POST",
                "/api/auth",
                serde_json::json!({ "pin": pin }),
            ))
            .await
            .unwrap()
            .status()
        }
    };

    assert_eq!(login("9999").await, StatusCode::OK);
    assert_eq!(login("1234").await, StatusCode::UNAUTHORIZED);
    // Backup PIN is immutable
    assert_eq!(login("0000").await, StatusCode::OK);
}

#[tokio::test]
async fn test_change_pin_with_backup_pin() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/auth",
            serde_json::json!({ "currentPin": "0000", "newPin": "2468" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_change_pin_rejects_bad_new_pin() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/auth",
            serde_json::json!({ "currentPin": "1234", "newPin": "99" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "PIN baru harus 4 digit angka");
}

#[tokio::test]
async fn test_change_pin_rejects_wrong_current_pin() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/auth",
            serde_json::json!({ "currentPin": "1111", "newPin": "9999" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "PIN saat ini salah");
}

// ========== Transaction API Tests ==========

#[tokio::test]
async fn test_create_and_list_transaction() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/transactions", coffee()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = get_body_json(response).await;
    assert!(created["id"].as_i64().unwrap() > 0);
    assert_eq!(created["title"], "Coffee");
    assert_eq!(created["type"], "expense");
    assert_eq!(created["date"], "2024-01-15");

    let response = app
        .oneshot(empty_request("GET", "/api/transactions"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Coffee");
    assert!(list[0]["amount"].is_number());
    assert_eq!(list[0]["amount"].as_f64(), Some(25000.0));
}

#[tokio::test]
async fn test_create_transaction_amount_as_string() {
    let app = setup_test_app();

    let mut body = coffee();
    body["amount"] = serde_json::json!("25000");

    let response = app
        .oneshot(json_request("POST", "/api/transactions", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = get_body_json(response).await;
    assert_eq!(json["amount"].as_f64(), Some(25000.0));
}

#[tokio::test]
async fn test_list_transactions_newest_first() {
    let app = setup_test_app();

    for (title, date) in [("Old", "2024-01-01"), ("New", "2024-02-01"), ("Mid", "2024-01-15")] {
        let mut body = coffee();
        body["title"] = serde_json::json!(title);
        body["date"] = serde_json::json!(date);
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/transactions", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(empty_request("GET", "/api/transactions"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let titles: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["New", "Mid", "Old"]);
}

#[tokio::test]
async fn test_create_transaction_validation() {
    let app = setup_test_app();

    let mut bad_date = coffee();
    bad_date["date"] = serde_json::json!("15-01-2024");
    let mut bad_amount = coffee();
    bad_amount["amount"] = serde_json::json!("banyak");
    let mut no_title = coffee();
    no_title["title"] = serde_json::json!("");

    for body in [bad_date, bad_amount, no_title] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/transactions", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = get_body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].is_string());
    }
}

#[tokio::test]
async fn test_create_transaction_with_unknown_category_succeeds() {
    let app = setup_test_app();

    let mut body = coffee();
    body["category"] = serde_json::json!("Tidak Ada");

    let response = app
        .oneshot(json_request("POST", "/api/transactions", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_transaction_without_type_is_stored_as_is() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    let mut body = coffee();
    body.as_object_mut().unwrap().remove("type");

    let response = app
        .oneshot(json_request("POST", "/api/transactions", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = get_body_json(response).await;
    assert_eq!(json["type"], "");

    let stored = db.list_transactions().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, "");
}

#[tokio::test]
async fn test_update_transaction() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/transactions", coffee()))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let mut body = coffee();
    body["title"] = serde_json::json!("Kopi Susu");
    body["amount"] = serde_json::json!(30000);

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/api/transactions?id={}", id),
            body,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);

    let tx = db.get_transaction(id).unwrap().unwrap();
    assert_eq!(tx.title, "Kopi Susu");
    assert_eq!(tx.amount, 30000.0);
}

#[tokio::test]
async fn test_update_missing_transaction_succeeds() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request("PUT", "/api/transactions?id=9999", coffee()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_transaction_id_query_validation() {
    let app = setup_test_app();

    for uri in ["/api/transactions", "/api/transactions?id=abc"] {
        let response = app
            .clone()
            .oneshot(json_request("PUT", uri, coffee()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "PUT {}", uri);

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "DELETE {}", uri);
    }
}

#[tokio::test]
async fn test_delete_transaction() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/transactions", coffee()))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/api/transactions?id={}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(db.get_transaction(id).unwrap().is_none());

    // Deleting again is a silent no-op
    let response = app
        .oneshot(empty_request("DELETE", &format!("/api/transactions?id={}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_concurrent_updates_last_write_wins() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/transactions", coffee()))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let update = |title: &'static str| {
        let app = app.clone();
        let mut body = coffee();
        body["title"] = serde_json::json!(title);
        async move {
            app.oneshot(json_request(
                "PUT",
                &format!("/api/transactions?id={}", id),
                body,
            ))
            .await
            .unwrap()
            .status()
        }
    };

    let (a, b) = tokio::join!(update("A"), update("B"));
    assert_eq!(a, StatusCode::OK);
    assert_eq!(b, StatusCode::OK);

    let title = db.get_transaction(id).unwrap().unwrap().title;
    assert!(title == "A" || title == "B");
}

// ========== Category API Tests ==========

#[tokio::test]
async fn test_create_category_defaults_to_expense() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/categories",
            serde_json::json!({ "name": "Food", "color": "#ff8800" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = get_body_json(response).await;
    assert!(json["id"].as_i64().unwrap() > 0);
    assert_eq!(json["name"], "Food");
    assert_eq!(json["color"], "#ff8800");
    assert_eq!(json["type"], "expense");
}

#[tokio::test]
async fn test_list_categories_by_name() {
    let db = Database::in_memory().unwrap();
    for name in ["Transport", "Food", "Salary"] {
        db.insert_category(&NewCategory {
            name: name.to_string(),
            color: None,
            kind: "expense".to_string(),
        })
        .unwrap();
    }
    let app = setup_test_app_with(db, test_config(), None);

    let response = app
        .oneshot(empty_request("GET", "/api/categories"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Food", "Salary", "Transport"]);
}

#[tokio::test]
async fn test_update_and_delete_category() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categories",
            serde_json::json!({ "name": "Gaji", "type": "income" }),
        ))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    // Type omitted on update falls back to expense
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/categories?id={}", id),
            serde_json::json!({ "name": "Bonus" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let category = db.get_category(id).unwrap().unwrap();
    assert_eq!(category.name, "Bonus");
    assert_eq!(category.kind, "expense");

    let response = app
        .oneshot(empty_request("DELETE", &format!("/api/categories?id={}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(db.get_category(id).unwrap().is_none());
}

#[tokio::test]
async fn test_delete_referenced_category_keeps_transactions() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/categories",
            serde_json::json!({ "name": "Food" }),
        ))
        .await
        .unwrap();
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/transactions", coffee()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(empty_request("DELETE", &format!("/api/categories?id={}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let transactions = db.list_transactions().unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].category, "Food");
}

#[tokio::test]
async fn test_create_category_requires_name() {
    let app = setup_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/categories",
            serde_json::json!({ "color": "#000000" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Chat API Tests ==========

#[tokio::test]
async fn test_chat_round_trip() {
    let db = Database::in_memory().unwrap();
    let mock = MockBackend::with_replies(["Pengeluaranmu bulan ini aman."]);
    let app = setup_test_app_with(db.clone(), test_config(), Some(AIClient::Mock(mock.clone())));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/chat",
            serde_json::json!({ "message": "Berapa pengeluaranku?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["response"], "Pengeluaranmu bulan ini aman.");
    assert!(json.get("debug").is_none());

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].user, "Berapa pengeluaranku?");

    let response = app.oneshot(empty_request("GET", "/api/chat")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let history = json.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["content"], "Berapa pengeluaranku?");
    assert_eq!(history[1]["role"], "assistant");
    assert_eq!(history[1]["content"], "Pengeluaranmu bulan ini aman.");
}

#[tokio::test]
async fn test_chat_context_reaches_system_prompt() {
    let mock = MockBackend::new();
    let app = setup_test_app_with(
        Database::in_memory().unwrap(),
        test_config(),
        Some(AIClient::Mock(mock.clone())),
    );

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat",
            serde_json::json!({ "message": "Halo", "context": "Pengguna sedang menabung" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].system.contains("Pengguna sedang menabung"));
}

#[tokio::test]
async fn test_chat_empty_message_rejected() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), Some(AIClient::mock()));

    for body in [
        serde_json::json!({ "message": "   " }),
        serde_json::json!({}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/chat", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = get_body_json(response).await;
        assert_eq!(json["error"], "Pesan tidak boleh kosong");
    }

    assert_eq!(db.count_chat_messages().unwrap(), 0);
}

#[tokio::test]
async fn test_chat_without_backend_apologizes() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat",
            serde_json::json!({ "message": "Halo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["response"], APOLOGY);
    assert!(json.get("debug").is_none());

    // Both sides are persisted, the apology included
    let history = db.recent_chat_messages(50).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].role, ChatRole::Assistant);
    assert_eq!(history[1].content, APOLOGY);
}

#[tokio::test]
async fn test_chat_failure_debug_when_verbose() {
    let config = ServerConfig {
        verbose_errors: true,
        ..Default::default()
    };
    let app = setup_test_app_with(
        Database::in_memory().unwrap(),
        config,
        Some(AIClient::Mock(MockBackend::failing("upstream exploded"))),
    );

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat",
            serde_json::json!({ "message": "Halo" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["response"], APOLOGY);
    assert!(json["debug"]
        .as_str()
        .unwrap()
        .contains("upstream exploded"));
}

#[tokio::test]
async fn test_chat_report_mode_never_runs_sql_from_model() {
    let db = Database::in_memory().unwrap();
    let config = ServerConfig {
        chat_mode: ChatMode::Report,
        ..Default::default()
    };
    let mock = MockBackend::with_replies(["DrOp TaBlE transactions;", "Aku belum bisa melihat datanya."]);
    let app = setup_test_app_with(db.clone(), config, Some(AIClient::Mock(mock.clone())));

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/transactions", coffee()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/chat",
            serde_json::json!({ "message": "Hapus semua datanya" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["response"], "Aku belum bisa melihat datanya.");

    // Planner call plus the persona-only fallback
    assert_eq!(mock.calls().len(), 2);
    assert_eq!(db.list_transactions().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chat_history_limit() {
    let db = Database::in_memory().unwrap();
    for i in 0..60 {
        db.insert_chat_message(ChatRole::User, &format!("message {}", i))
            .unwrap();
    }
    let app = setup_test_app_with(db, test_config(), None);

    let response = app.oneshot(empty_request("GET", "/api/chat")).await.unwrap();

    let json = get_body_json(response).await;
    let history = json.as_array().unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0]["content"], "message 10");
    assert_eq!(history[49]["content"], "message 59");
}

#[tokio::test]
async fn test_clear_chat_history() {
    let db = Database::in_memory().unwrap();
    db.insert_chat_message(ChatRole::User, "Halo").unwrap();
    db.insert_chat_message(ChatRole::Assistant, "Hai").unwrap();
    let app = setup_test_app_with(db, test_config(), None);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/api/chat"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);

    let response = app.oneshot(empty_request("GET", "/api/chat")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json, serde_json::json!([]));
}

// ========== Diagnostics Tests ==========

#[tokio::test]
async fn test_ping() {
    let app = setup_test_app();

    let response = app.oneshot(empty_request("GET", "/api/ping")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["pong"], true);
    for name in handlers::PING_ENV_VARS {
        let value = json["env"][*name].as_str().unwrap();
        assert!(value == "Set" || value == "Missing");
    }
}

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();

    let response = app
        .oneshot(empty_request("GET", "/api/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db"], "connected");
    assert_eq!(json["ai"], "mock");
}

#[tokio::test]
async fn test_setup_is_idempotent() {
    let db = Database::in_memory().unwrap();
    let app = setup_test_app_with(db.clone(), test_config(), None);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/setup"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = get_body_json(response).await;
        assert_eq!(json["success"], true);
    }

    let count: i64 = db
        .conn()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_debug_db() {
    let app = setup_test_app();

    let response = app
        .oneshot(empty_request("GET", "/api/debug-db"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["result"]["val"], 1);
}

// ========== Error Handling Tests ==========

#[tokio::test]
async fn test_method_not_allowed() {
    let app = setup_test_app();

    for (method, uri) in [
        ("PATCH", "/api/transactions"),
        ("PATCH", "/api/categories"),
        ("DELETE", "/api/auth"),
        ("PUT", "/api/chat"),
        ("POST", "/api/health"),
    ] {
        let response = app
            .clone()
            .oneshot(empty_request(method, uri))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED,
            "{} {}",
            method,
            uri
        );
        let json = get_body_json(response).await;
        assert_eq!(json["error"], "Method not allowed");
    }
}

#[tokio::test]
async fn test_internal_error_is_sanitized() {
    let db = Database::in_memory().unwrap();
    db.conn()
        .unwrap()
        .execute_batch("DROP TABLE transactions")
        .unwrap();
    let app = setup_test_app_with(db, test_config(), None);

    let response = app
        .oneshot(empty_request("GET", "/api/transactions"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn test_internal_error_verbose() {
    let db = Database::in_memory().unwrap();
    db.conn()
        .unwrap()
        .execute_batch("DROP TABLE transactions")
        .unwrap();
    let config = ServerConfig {
        verbose_errors: true,
        ..Default::default()
    };
    let app = setup_test_app_with(db, config, None);

    let response = app
        .oneshot(empty_request("GET", "/api/transactions"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = get_body_json(response).await;
    assert_eq!(json["success"], false);
    let message = json["error"].as_str().unwrap();
    assert!(message.starts_with("Server error: "));
    assert!(message.contains("transactions"));
}

#[tokio::test]
async fn test_validation_errors_unchanged_when_verbose() {
    let config = ServerConfig {
        verbose_errors: true,
        ..Default::default()
    };
    let app = setup_test_app_with(Database::in_memory().unwrap(), config, None);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "pin": "abc" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "PIN harus 4 digit angka");
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let app = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/transactions")
                .header("origin", "http://localhost:5173")
                .header("access-control-request-method", "PUT")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_security_headers() {
    let app = setup_test_app();

    let response = app.oneshot(empty_request("GET", "/api/ping")).await.unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
}
