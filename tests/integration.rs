use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use notify_hub::config::AppConfig;
use notify_hub::server::middleware::rate_limit::{
    AdmissionError, AdmissionLimiter, AdmissionStore, LimitContext,
};
use notify_hub::server::middleware::TokenValidator;
use notify_hub::server::{self, AppState, Hub};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message;

const SECRET: &str = "integration-secret";

fn test_config() -> AppConfig {
    AppConfig {
        port: 0,
        jwt_secret: SECRET.to_string(),
        jwt_allow_bare_token: false,
        rate_limit_quota: 1000,
        rate_limit_window_secs: 60,
        send_queue_capacity: 16,
        ping_interval_secs: 54,
        pong_timeout_secs: 60,
    }
}

fn spawn_server_with_state(state: AppState) -> SocketAddr {
    let app = server::router(state);
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });
    addr
}

fn spawn_server(config: AppConfig) -> (SocketAddr, AppState) {
    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());
    let state = AppState::new(Arc::new(config), handle);
    (spawn_server_with_state(state.clone()), state)
}

async fn wait_for_sessions(state: &AppState, expected: usize) {
    for _ in 0..200 {
        if state.hub.session_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("live session count never reached {expected}");
}

async fn next_text<S>(ws: &mut S) -> String
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await.expect("connection closed").unwrap() {
            Message::Text(text) => return text,
            _ => {}
        }
    }
}

fn owner_token() -> String {
    let claims = json!({
        "user_id": 1,
        "email": "owner@example.com",
        "role": "owner",
        "iat": Utc::now().timestamp(),
        "exp": Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn broadcast_reaches_all_connected_clients() {
    let (addr, state) = spawn_server(test_config());

    let (mut first, _) = connect_async(format!("ws://{addr}/ws?user_id=alice"))
        .await
        .unwrap();
    let (mut second, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    wait_for_sessions(&state, 2).await;

    server::broadcast_success(&state.hub, "stock updated", json!({ "n": 1 })).unwrap();

    for client in [&mut first, &mut second] {
        let value: Value = serde_json::from_str(&next_text(client).await).unwrap();
        assert_eq!(value["type"], "success");
        assert_eq!(value["data"]["message"], "stock updated");
        assert_eq!(value["data"]["data"]["n"], 1);
    }
}

#[tokio::test]
async fn disconnected_client_leaves_the_live_set() {
    let (addr, state) = spawn_server(test_config());

    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    wait_for_sessions(&state, 1).await;

    drop(client);
    wait_for_sessions(&state, 0).await;
}

#[tokio::test]
async fn keepalive_pings_are_sent() {
    let mut config = test_config();
    config.ping_interval_secs = 1;
    let (addr, state) = spawn_server(config);

    let (mut client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    wait_for_sessions(&state, 1).await;

    let frame = tokio::time::timeout(Duration::from_secs(3), client.next())
        .await
        .expect("no frame within ping interval")
        .unwrap()
        .unwrap();
    assert!(matches!(frame, Message::Ping(_)));
}

#[tokio::test]
async fn notify_endpoint_broadcasts_for_an_owner() {
    let (addr, state) = spawn_server(test_config());

    let (mut client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    wait_for_sessions(&state, 1).await;

    let http = hyper::Client::new();
    let request = hyper::Request::builder()
        .method("POST")
        .uri(format!("http://{addr}/api/notify"))
        .header("authorization", format!("Bearer {}", owner_token()))
        .header("content-type", "application/json")
        .body(hyper::Body::from(
            json!({ "type": "purchase_order.created", "data": { "id": 7 } }).to_string(),
        ))
        .unwrap();

    let response = http.request(request).await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-ratelimit-limit"));
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
    assert!(response.headers().contains_key("x-ratelimit-reset"));

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["success"], true);

    let event: Value = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(event["type"], "purchase_order.created");
    assert_eq!(event["data"]["id"], 7);
}

#[tokio::test]
async fn notify_endpoint_rejects_missing_credentials() {
    let (addr, _state) = spawn_server(test_config());

    let http = hyper::Client::new();
    let request = hyper::Request::builder()
        .method("POST")
        .uri(format!("http://{addr}/api/notify"))
        .header("content-type", "application/json")
        .body(hyper::Body::from(json!({ "type": "noop" }).to_string()))
        .unwrap();

    let response = http.request(request).await.unwrap();
    assert_eq!(response.status(), 401);

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["message"], "Authorization header required");
}

#[tokio::test]
async fn admission_quota_is_enforced_per_window() {
    let mut config = test_config();
    config.rate_limit_quota = 3;
    config.rate_limit_window_secs = 1;
    let (addr, _state) = spawn_server(config);

    let http = hyper::Client::new();
    let get = |path: &str| {
        hyper::Request::builder()
            .uri(format!("http://{addr}{path}"))
            .body(hyper::Body::empty())
            .unwrap()
    };

    for expected_remaining in ["2", "1", "0"] {
        let response = http.request(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            expected_remaining
        );
    }

    let response = http.request(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), 429);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let envelope: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["success"], false);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = http.request(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "2");
}

struct BrokenStore;

impl AdmissionStore for BrokenStore {
    fn incr(
        &self,
        _key: &str,
        _limit: i64,
        _window: Duration,
    ) -> Result<LimitContext, AdmissionError> {
        Err(AdmissionError::StoreUnavailable("store is down".into()))
    }
}

#[tokio::test]
async fn broken_admission_store_fails_open() {
    let config = Arc::new(test_config());
    let (hub, handle) = Hub::new();
    tokio::spawn(hub.run());

    let state = AppState {
        config: config.clone(),
        hub: handle,
        limiter: AdmissionLimiter::with_store(Arc::new(BrokenStore), 3, Duration::from_secs(60)),
        validator: Arc::new(TokenValidator::new(&config.jwt_secret, false)),
    };
    let addr = spawn_server_with_state(state);

    let http = hyper::Client::new();
    let request = hyper::Request::builder()
        .uri(format!("http://{addr}/healthz"))
        .body(hyper::Body::empty())
        .unwrap();

    let response = http.request(request).await.unwrap();
    assert_eq!(response.status(), 200);
    // the limiter never produced a context, so no headers are attached
    assert!(!response.headers().contains_key("x-ratelimit-limit"));
}
