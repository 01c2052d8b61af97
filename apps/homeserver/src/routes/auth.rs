//! Session routes: versions, login, registration and logout.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::auth::tokens;
use crate::error::{ApiError, FieldError};
use crate::AppState;

/// Unversioned routes under `/_matrix/client`.
pub fn versions_router() -> Router<AppState> {
    Router::new().route("/versions", get(versions))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_flows).post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/logout/all", post(logout_all))
}

async fn versions() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "versions": ["r0.6.1"] }))
}

async fn login_flows() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "flows": [{ "type": "m.login.password" }] }))
}

/// Successful login or registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub access_token: String,
    pub device_id: String,
    pub home_server: String,
}

// ---------------------------------------------------------------------------
// POST /_matrix/client/r0/register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_id: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(body) = body?;

    let mut errors = Vec::new();
    let username = body.username.as_deref().map(str::trim).unwrap_or_default();
    if username.is_empty() {
        errors.push(FieldError::new("username", "Username is required"));
    }
    let password = body.password.as_deref().unwrap_or_default();
    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let device_id = body.device_id.unwrap_or_else(tokens::generate_device_id);
    let (user, access_token) = state.store.register(username, password, &device_id)?;

    Ok(Json(SessionResponse {
        user_id: user.user_id,
        access_token,
        device_id,
        home_server: state.store.server_name().to_string(),
    }))
}

// ---------------------------------------------------------------------------
// POST /_matrix/client/r0/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginIdentifier {
    pub user: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub login_type: Option<String>,
    /// Bare localpart or `@local:server`.
    pub user: Option<String>,
    pub identifier: Option<LoginIdentifier>,
    pub password: Option<String>,
    pub device_id: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(body) = body?;

    if let Some(login_type) = body.login_type.as_deref() {
        if login_type != "m.login.password" {
            return Err(ApiError::invalid_param(format!(
                "Unsupported login type: {login_type}"
            )));
        }
    }

    let username = body
        .user
        .or_else(|| body.identifier.and_then(|i| i.user))
        .ok_or_else(|| {
            ApiError::validation(vec![FieldError::new("user", "User is required")])
        })?;
    let password = body.password.unwrap_or_default();

    let device_id = body.device_id.unwrap_or_else(tokens::generate_device_id);
    let (user, access_token) = state.store.login(&username, &password, &device_id)?;

    Ok(Json(SessionResponse {
        user_id: user.user_id,
        access_token,
        device_id,
        home_server: state.store.server_name().to_string(),
    }))
}

// ---------------------------------------------------------------------------
// POST /_matrix/client/r0/logout, /logout/all
// ---------------------------------------------------------------------------

async fn logout(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    state.store.account(&auth.user).logout(&auth.token);
    Json(serde_json::json!({}))
}

async fn logout_all(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    state.store.account(&user).logout_all();
    Json(serde_json::json!({}))
}
