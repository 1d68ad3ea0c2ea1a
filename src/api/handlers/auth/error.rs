//! Typed API errors and their JSON rendering.
//!
//! Handlers return `ApiError` so callers can distinguish recoverable business
//! errors from unexpected failures without string-matching messages. Unexpected
//! failures are logged server-side with full context and surfaced to the client
//! only as a generic system error.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    RateLimited {
        message: String,
        cooldown_seconds: Option<i64>,
    },
    #[error("system error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub(super) fn rate_limited(message: impl Into<String>, cooldown_seconds: Option<i64>) -> Self {
        Self::RateLimited {
            message: message.into(),
            cooldown_seconds,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body: `status` is always `"error"`; rate-limited responses carry the
/// remaining wait so clients can render a countdown.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<i64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, cooldown_seconds) = match self {
            Self::Internal(err) => {
                // Internals (SQL errors, stack context) never reach the client.
                error!("internal error: {err:#}");
                ("A system error occurred".to_string(), None)
            }
            Self::RateLimited {
                message,
                cooldown_seconds,
            } => (message, cooldown_seconds),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            status: "error".to_string(),
            message,
            cooldown_seconds,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("no".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("csrf".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::rate_limited("slow down", Some(42)).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Internal(anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn rate_limited_response_carries_cooldown() {
        let response = ApiError::rate_limited("Too many attempts", Some(17)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn internal_error_hides_details() {
        let response = ApiError::Internal(anyhow!("connection refused to 10.0.0.3")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
