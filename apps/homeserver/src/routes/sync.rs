use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::ApiError;
use crate::sync::{SyncReply, SyncRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/sync", get(sync))
}

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    pub since: Option<String>,
    pub filter: Option<String>,
    /// Milliseconds to wait for new events.
    pub timeout: Option<u64>,
}

// Dropping this future on client disconnect cancels a suspended sync.
async fn sync(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    params: Result<Query<SyncParams>, QueryRejection>,
) -> Result<Json<SyncReply>, ApiError> {
    let Query(params) = params?;
    let request = SyncRequest {
        since: params.since,
        filter: params.filter,
        timeout: Duration::from_millis(params.timeout.unwrap_or(0)),
    };
    Ok(Json(state.store.sync_as(&user, request).await?))
}
