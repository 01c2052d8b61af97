//! Per-user routes: identity, credentials, devices and stored sync filters.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::models::filter::SyncFilter;
use crate::models::user::Device;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/account/whoami", get(whoami))
        .route("/capabilities", get(capabilities))
        .route("/account/password", post(change_password))
        .route("/devices", get(devices))
        .route("/joined_rooms", get(joined_rooms))
        .route("/user/{user_id}/filter", post(create_filter))
        .route("/user/{user_id}/filter/{filter_id}", get(get_filter))
}

async fn whoami(AuthUser { user, .. }: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user_id": user.user_id }))
}

async fn capabilities(_: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "capabilities": { "m.change_password": { "enabled": true } }
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: Option<String>,
}

async fn change_password(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    let new_password = body
        .new_password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            ApiError::validation(vec![FieldError::new(
                "new_password",
                "New password is required",
            )])
        })?;

    state.store.account(&user).change_password(&new_password)?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}

async fn devices(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<DevicesResponse> {
    Json(DevicesResponse {
        devices: state.store.account(&user).devices(),
    })
}

#[derive(Debug, Serialize)]
pub struct JoinedRoomsResponse {
    pub joined_rooms: Vec<String>,
}

async fn joined_rooms(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<JoinedRoomsResponse> {
    Json(JoinedRoomsResponse {
        joined_rooms: state.store.account(&user).joined_rooms(),
    })
}

/// Filters are private: the path user must be the caller.
fn ensure_self(caller: &str, path_user: &str) -> Result<(), ApiError> {
    if caller == path_user {
        Ok(())
    } else {
        Err(ApiError::forbidden("Cannot manage filters of another user"))
    }
}

async fn create_filter(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<SyncFilter>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ensure_self(user.id(), &user_id)?;
    let Json(filter) = body?;
    let filter_id = state.store.account(&user).create_filter(filter)?;
    Ok(Json(serde_json::json!({ "filter_id": filter_id })))
}

async fn get_filter(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path((user_id, filter_id)): Path<(String, String)>,
) -> Result<Json<SyncFilter>, ApiError> {
    ensure_self(user.id(), &user_id)?;
    Ok(Json(state.store.account(&user).filter(&filter_id)?))
}
