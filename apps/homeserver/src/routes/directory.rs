//! Room directory: visibility, alias resolution and the public room list.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::models::room::{Room, Visibility};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/directory/list/room/{room_id}",
            get(get_visibility).put(set_visibility),
        )
        .route("/directory/room/{alias}", get(room_by_alias))
        .route("/publicRooms", get(public_rooms))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VisibilityBody {
    pub visibility: Visibility,
}

async fn get_visibility(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<VisibilityBody>, ApiError> {
    let room = state
        .store
        .get_room_by_id(&room_id)
        .ok_or_else(|| ApiError::not_found("Room not found"))?;
    Ok(Json(VisibilityBody {
        visibility: room.visibility(),
    }))
}

async fn set_visibility(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    body: Result<Json<VisibilityBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    state
        .store
        .account(&user)
        .set_room_visibility(&room_id, body.visibility)?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Serialize)]
pub struct AliasResponse {
    pub room_id: String,
    pub servers: Vec<String>,
}

async fn room_by_alias(
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> Result<Json<AliasResponse>, ApiError> {
    let room = state
        .store
        .get_room_by_alias(&alias)
        .ok_or_else(|| ApiError::not_found("Room alias not found"))?;
    Ok(Json(AliasResponse {
        room_id: room.room_id,
        servers: vec![state.store.server_name().to_string()],
    }))
}

#[derive(Debug, Deserialize)]
pub struct PublicRoomsParams {
    pub filter: Option<String>,
}

/// One entry of the public room list.
#[derive(Debug, Serialize)]
pub struct PublicRoomChunk {
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_alias: Option<String>,
    pub num_joined_members: usize,
}

impl PublicRoomChunk {
    fn new(room: Room, server_name: &str) -> Self {
        Self {
            num_joined_members: room.members.len(),
            canonical_alias: room.alias.map(|a| format!("#{a}:{server_name}")),
            room_id: room.room_id,
            name: room.name,
            topic: room.topic,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PublicRoomsResponse {
    pub chunk: Vec<PublicRoomChunk>,
    pub total_room_count_estimate: usize,
}

async fn public_rooms(
    State(state): State<AppState>,
    params: Result<Query<PublicRoomsParams>, QueryRejection>,
) -> Result<Json<PublicRoomsResponse>, ApiError> {
    let Query(params) = params?;
    let server_name = state.store.server_name();
    let chunk: Vec<PublicRoomChunk> = state
        .store
        .public_rooms(params.filter.as_deref().unwrap_or_default())
        .into_iter()
        .map(|room| PublicRoomChunk::new(room, server_name))
        .collect();
    Ok(Json(PublicRoomsResponse {
        total_room_count_estimate: chunk.len(),
        chunk,
    }))
}
