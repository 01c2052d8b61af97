use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// The closed set of failure kinds callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Forbidden,
    UnknownToken,
    MissingToken,
    UserInUse,
    InvalidUsername,
    NotFound,
    NotMember,
    AliasInUse,
    UnknownFilter,
    InvalidParam,
    BadJson,
    Unknown,
}

impl ErrorKind {
    /// Stable wire code for this kind.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Forbidden => "M_FORBIDDEN",
            ErrorKind::UnknownToken => "M_UNKNOWN_TOKEN",
            ErrorKind::MissingToken => "M_MISSING_TOKEN",
            ErrorKind::UserInUse => "M_USER_IN_USE",
            ErrorKind::InvalidUsername => "M_INVALID_USERNAME",
            ErrorKind::NotFound => "M_NOT_FOUND",
            ErrorKind::NotMember => "M_NOT_MEMBER",
            ErrorKind::AliasInUse => "M_ROOM_IN_USE",
            ErrorKind::UnknownFilter => "M_UNKNOWN_FILTER",
            ErrorKind::InvalidParam => "M_INVALID_PARAM",
            ErrorKind::BadJson => "M_BAD_JSON",
            ErrorKind::Unknown => "M_UNKNOWN",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Forbidden | ErrorKind::NotMember => StatusCode::FORBIDDEN,
            ErrorKind::UnknownToken | ErrorKind::MissingToken => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::UserInUse
            | ErrorKind::InvalidUsername
            | ErrorKind::AliasInUse
            | ErrorKind::UnknownFilter
            | ErrorKind::InvalidParam
            | ErrorKind::BadJson => StatusCode::BAD_REQUEST,
        }
    }
}

/// Structured API error returned to clients.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Every failure of the core: a kind to branch on plus an informational message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn unknown_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownToken, message)
    }

    pub fn missing_token(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingToken, message)
    }

    pub fn user_in_use(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserInUse, message)
    }

    pub fn invalid_username(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidUsername, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn not_member(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotMember, message)
    }

    pub fn alias_in_use(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AliasInUse, message)
    }

    pub fn unknown_filter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownFilter, message)
    }

    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParam, message)
    }

    pub fn bad_json(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadJson, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            kind: ErrorKind::InvalidParam,
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.kind.code(),
                message: self.message,
                details: self.details,
            },
        };
        (self.kind.status(), Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::bad_json(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        Self::invalid_param(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_unauthorized() {
        assert_eq!(ErrorKind::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::UnknownToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn alias_conflicts_use_the_room_in_use_code() {
        let err = ApiError::alias_in_use("taken");
        assert_eq!(err.kind.code(), "M_ROOM_IN_USE");
        assert_eq!(err.to_string(), "M_ROOM_IN_USE: taken");
    }

    #[test]
    fn validation_carries_field_details() {
        let err = ApiError::validation(vec![FieldError::new("body", "required")]);
        assert_eq!(err.kind, ErrorKind::InvalidParam);
        assert_eq!(err.details.unwrap()[0].field, "body");
    }
}
