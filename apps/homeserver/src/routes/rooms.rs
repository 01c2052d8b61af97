//! Room lifecycle and timeline writes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::models::room::CreateRoomRequest;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createRoom", post(create_room))
        .route("/join/{room_id_or_alias}", post(join_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route("/rooms/{room_id}/leave", post(leave_room))
        .route("/rooms/{room_id}/state/m.room.topic", put(set_topic))
        .route(
            "/rooms/{room_id}/send/m.room.message/{txn_id}",
            put(send_message),
        )
}

#[derive(Debug, Serialize)]
pub struct RoomIdResponse {
    pub room_id: String,
}

#[derive(Debug, Serialize)]
pub struct EventIdResponse {
    pub event_id: String,
}

async fn create_room(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<Json<RoomIdResponse>, ApiError> {
    let Json(body) = body?;
    let room = state.store.account(&user).create_room(body)?;
    Ok(Json(RoomIdResponse {
        room_id: room.room_id,
    }))
}

async fn join_room(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path(room_id_or_alias): Path<String>,
) -> Result<Json<RoomIdResponse>, ApiError> {
    let room = state.store.account(&user).join_room(&room_id_or_alias)?;
    Ok(Json(RoomIdResponse {
        room_id: room.room_id,
    }))
}

async fn leave_room(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.account(&user).leave_room(&room_id)?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: Option<String>,
}

async fn set_topic(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    body: Result<Json<TopicRequest>, JsonRejection>,
) -> Result<Json<EventIdResponse>, ApiError> {
    let Json(body) = body?;
    let topic = body.topic.ok_or_else(|| {
        ApiError::validation(vec![FieldError::new("topic", "Topic is required")])
    })?;
    let event_id = state.store.account(&user).set_topic(&room_id, &topic)?;
    Ok(Json(EventIdResponse { event_id }))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub msgtype: Option<String>,
    pub body: Option<String>,
}

async fn send_message(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    // Sends are not deduplicated by txn id, so a retried request posts twice.
    Path((room_id, _txn_id)): Path<(String, String)>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<EventIdResponse>, ApiError> {
    let Json(body) = body?;
    if let Some(msgtype) = body.msgtype.as_deref() {
        if msgtype != "m.text" {
            return Err(ApiError::validation(vec![FieldError::new(
                "msgtype",
                "Only m.text messages are supported",
            )]));
        }
    }
    let event_id = state
        .store
        .account(&user)
        .send_message(&room_id, body.body.as_deref().unwrap_or_default())?;
    Ok(Json(EventIdResponse { event_id }))
}
