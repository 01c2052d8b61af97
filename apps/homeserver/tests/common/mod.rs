#![allow(dead_code)]

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::Router;
use axum_test::TestServer;
use serde::Deserialize;

use homeserver::config::Config;
use homeserver::store::Store;
use homeserver::AppState;

/// Config with cheap password hashing and short sync timeouts.
pub fn test_config() -> Config {
    Config {
        password_memory_kib: 64,
        password_iterations: 1,
        sync_max_timeout_ms: 5_000,
        ..Config::default()
    }
}

pub fn test_state() -> AppState {
    let config = test_config();
    let store = Store::new(&config).expect("test argon2 params");
    AppState::new(config, store)
}

pub fn test_app() -> (Router, AppState) {
    let state = test_state();
    let app = homeserver::routes::router().with_state(state.clone());
    (app, state)
}

pub fn test_server() -> (TestServer, AppState) {
    let (app, state) = test_app();
    (TestServer::new(app).unwrap(), state)
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub device_id: String,
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Registers `username` with a fixed password and returns the session.
pub async fn register(server: &TestServer, username: &str) -> Session {
    let resp = server
        .post("/_matrix/client/r0/register")
        .json(&serde_json::json!({
            "username": username,
            "password": "pw123456",
            "device_id": "d1",
        }))
        .await;
    resp.assert_status_ok();
    resp.json()
}

/// Creates a room as `token` and returns its id.
pub async fn create_room(server: &TestServer, token: &str, body: serde_json::Value) -> String {
    let resp = server
        .post("/_matrix/client/r0/createRoom")
        .add_header(AUTHORIZATION, bearer(token))
        .json(&body)
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    body["room_id"].as_str().unwrap().to_string()
}

pub async fn send_text(server: &TestServer, token: &str, room_id: &str, txn: &str, text: &str) -> String {
    let resp = server
        .put(&format!(
            "/_matrix/client/r0/rooms/{room_id}/send/m.room.message/{txn}"
        ))
        .add_header(AUTHORIZATION, bearer(token))
        .json(&serde_json::json!({ "msgtype": "m.text", "body": text }))
        .await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    body["event_id"].as_str().unwrap().to_string()
}

pub async fn sync(
    server: &TestServer,
    token: &str,
    since: Option<&str>,
    timeout_ms: u64,
) -> serde_json::Value {
    let mut request = server
        .get("/_matrix/client/r0/sync")
        .add_header(AUTHORIZATION, bearer(token))
        .add_query_param("timeout", timeout_ms);
    if let Some(since) = since {
        request = request.add_query_param("since", since);
    }
    let resp = request.await;
    resp.assert_status_ok();
    resp.json()
}
