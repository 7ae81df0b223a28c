//! Integration tests: boot the relay on a free port next to mock membership
//! and provider servers, then drive the webhook with real HTTP requests.
//! No external services are required.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::{Form, Router};
use lib::config::{Config, RouteConfig};
use lib::server;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Mock membership store: serves the same member list for every group id.
#[derive(Clone)]
struct MockStore {
    members: Arc<Vec<String>>,
}

async fn mock_count(State(store): State<MockStore>, Path(_id): Path<i64>) -> Json<Value> {
    Json(json!({ "count": store.members.len() }))
}

async fn mock_members(State(store): State<MockStore>, Path(_id): Path<i64>) -> Json<Value> {
    Json(json!({ "members": *store.members }))
}

async fn spawn_membership(port: u16, members: Vec<String>) {
    let store = MockStore {
        members: Arc::new(members),
    };
    let app = Router::new()
        .route("/groups/:id/count", get(mock_count))
        .route("/groups/:id/members", get(mock_members))
        .with_state(store);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("bind membership mock");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
}

/// Mock outbound provider: records (To, From) for every message create call.
#[derive(Clone, Default)]
struct MockProvider {
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

async fn mock_create_message(
    State(provider): State<MockProvider>,
    Path(_sid): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let to = fields.get("To").cloned().unwrap_or_default();
    let from = fields.get("From").cloned().unwrap_or_default();
    provider.requests.lock().unwrap().push((to, from));
    (StatusCode::CREATED, Json(json!({ "status": "queued" })))
}

async fn spawn_provider(port: u16) -> MockProvider {
    let provider = MockProvider::default();
    let app = Router::new()
        .route(
            "/2010-04-01/Accounts/:sid/Messages.json",
            post(mock_create_message),
        )
        .with_state(provider.clone());
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("bind provider mock");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    provider
}

fn relay_config(relay_port: u16, membership_port: u16, provider_port: u16) -> Config {
    let mut config = Config::default();
    config.server.port = relay_port;
    config.server.bind = "127.0.0.1".to_string();
    config.account.account_sid = "ACXYZ".to_string();
    config.account.auth_token = "secret".to_string();
    config.routes.push(RouteConfig {
        name: "ops".to_string(),
        phone_number: "+15550001000".to_string(),
        group_id: 7,
    });
    config.delivery.inline_limit = 10;
    config.membership.base_url = format!("http://127.0.0.1:{}", membership_port);
    config.provider.base_url = format!("http://127.0.0.1:{}", provider_port);
    config
}

/// Spawn the relay and wait for its health endpoint to answer.
async fn spawn_relay(config: Config) -> String {
    let base = format!("http://127.0.0.1:{}", config.server.port);
    tokio::spawn(async move {
        let _ = server::run_server(config).await;
    });
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(&base).send().await {
            if resp.status().is_success() {
                return base;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("relay did not come up on {}", base);
}

fn event_form(account_sid: &str, to: &str) -> Vec<(&'static str, String)> {
    vec![
        ("AccountSid", account_sid.to_string()),
        ("To", to.to_string()),
        ("From", "+15557771234".to_string()),
        ("Body", "hello group".to_string()),
    ]
}

#[tokio::test]
async fn health_reports_routes_and_workers() {
    let (relay_port, membership_port, provider_port) = (free_port(), free_port(), free_port());
    spawn_membership(membership_port, Vec::new()).await;
    spawn_provider(provider_port).await;
    let base = spawn_relay(relay_config(relay_port, membership_port, provider_port)).await;

    let json: Value = reqwest::get(&base).await.expect("get").json().await.expect("json");
    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(json.get("routes").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(json.get("workers").and_then(|v| v.as_u64()), Some(5));
}

#[tokio::test]
async fn small_group_is_answered_inline() {
    let (relay_port, membership_port, provider_port) = (free_port(), free_port(), free_port());
    let members = vec![
        "+15550000001".to_string(),
        "+15550000002".to_string(),
        "+15550000003".to_string(),
    ];
    spawn_membership(membership_port, members.clone()).await;
    let provider = spawn_provider(provider_port).await;
    let base = spawn_relay(relay_config(relay_port, membership_port, provider_port)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/sms", base))
        .form(&event_form("ACXYZ", "+15550001000"))
        .send()
        .await
        .expect("post");
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/xml")
    );
    let body = resp.text().await.expect("body");
    assert_eq!(body.matches("<Message ").count(), 3);
    assert_eq!(body.matches("from=\"+15557771234\"").count(), 3);
    for member in &members {
        assert!(body.contains(&format!("to=\"{}\"", member)));
    }
    // Inline order follows store order.
    let positions: Vec<usize> = members
        .iter()
        .map(|m| body.find(m.as_str()).expect("member present"))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    // The inline path never calls the provider.
    assert!(provider.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn large_group_is_acknowledged_and_fanned_out() {
    let (relay_port, membership_port, provider_port) = (free_port(), free_port(), free_port());
    let members: Vec<String> = (0..50).map(|i| format!("+1555100{:04}", i)).collect();
    spawn_membership(membership_port, members.clone()).await;
    let provider = spawn_provider(provider_port).await;
    let base = spawn_relay(relay_config(relay_port, membership_port, provider_port)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/sms", base))
        .form(&event_form("ACXYZ", "+15550001000"))
        .send()
        .await
        .expect("post");
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("body");
    assert!(!body.contains("<Message "), "deferred ack must be empty");

    // The fan-out happens in the background after the ack.
    let mut sent = 0;
    for _ in 0..100 {
        sent = provider.requests.lock().unwrap().len();
        if sent == 50 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(sent, 50, "all 50 members attempted");
    for (_, from) in provider.requests.lock().unwrap().iter() {
        assert_eq!(from, "+15550001000", "deferred sends use the route number");
    }
}

#[tokio::test]
async fn account_sid_mismatch_is_rejected_without_store_query() {
    let (relay_port, membership_port, provider_port) = (free_port(), free_port(), free_port());
    // No membership mock at all: a rejected event must not query the store.
    spawn_provider(provider_port).await;
    let base = spawn_relay(relay_config(relay_port, membership_port, provider_port)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/sms", base))
        .form(&event_form("WRONG", "+15550001000"))
        .send()
        .await
        .expect("post");
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn unknown_destination_is_rejected_without_store_query() {
    let (relay_port, membership_port, provider_port) = (free_port(), free_port(), free_port());
    spawn_provider(provider_port).await;
    let base = spawn_relay(relay_config(relay_port, membership_port, provider_port)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/sms", base))
        .form(&event_form("ACXYZ", "+19999999999"))
        .send()
        .await
        .expect("post");
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn unreachable_store_rejects_the_event() {
    let (relay_port, membership_port, provider_port) = (free_port(), free_port(), free_port());
    // membership_port has no listener; the count query fails.
    spawn_provider(provider_port).await;
    let base = spawn_relay(relay_config(relay_port, membership_port, provider_port)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/sms", base))
        .form(&event_form("ACXYZ", "+15550001000"))
        .send()
        .await
        .expect("post");
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn absent_fields_fail_validation_not_parsing() {
    let (relay_port, membership_port, provider_port) = (free_port(), free_port(), free_port());
    spawn_provider(provider_port).await;
    let base = spawn_relay(relay_config(relay_port, membership_port, provider_port)).await;

    // Empty body: every field defaults to "", which fails the account check —
    // but it is a clean 500, not a 4xx parse error.
    let resp = reqwest::Client::new()
        .post(format!("{}/sms", base))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("")
        .send()
        .await
        .expect("post");
    assert_eq!(resp.status(), 500);
}
