//! Access token extraction.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::user::User;
use crate::AppState;

/// Authenticated user resolved from `Authorization: Bearer <token>` or the
/// `access_token` query parameter.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct AccessTokenQuery {
    access_token: Option<String>,
}

/// Pull the raw access token out of a request, header first.
fn extract_token(parts: &Parts) -> Result<String, ApiError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let header = header
            .to_str()
            .map_err(|_| ApiError::missing_token("Invalid Authorization header"))?;
        return header
            .strip_prefix("Bearer ")
            .map(str::to_string)
            .ok_or_else(|| ApiError::missing_token("Invalid Authorization header format"));
    }

    Query::<AccessTokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::missing_token("Missing access token"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?;

        let user = state
            .store
            .resolve_token(&token)
            .ok_or_else(|| ApiError::unknown_token("Unrecognised access token"))?;

        Ok(AuthUser { user, token })
    }
}
