//! Access-token renewal from a refresh token.

use anyhow::anyhow;
use axum::{Json, extract::Extension};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::token::{self, Claims, TokenKind, encode};

use super::denylist;
use super::error::ApiError;
use super::state::AuthState;
use super::types::{RefreshTokenRequest, RefreshTokenResponse};
use super::utils::now_unix_seconds;

/// Exchange a valid refresh token for a fresh access token.
///
/// No CSRF check here: the refresh token itself is the credential and is
/// never sent automatically by the browser. Access tokens only; a new
/// refresh token requires a full login.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token minted", body = RefreshTokenResponse),
        (status = 400, description = "Missing payload"),
        (status = 401, description = "Invalid, expired, revoked, or wrong-kind token")
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<Json<RefreshTokenResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::Validation("Missing refresh token".to_string()));
    }

    let secret = auth_state.token_secret();
    let claims = token::decode(secret, request.refresh_token.trim(), now_unix_seconds())
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".to_string()))?;

    // An access token must never stand in for a refresh token.
    if claims.kind != TokenKind::Refresh {
        return Err(ApiError::Unauthorized(
            "Not a refresh token".to_string(),
        ));
    }

    if denylist::is_denied(&pool, &claims.jti).await? {
        return Err(ApiError::Unauthorized(
            "Refresh token has been revoked".to_string(),
        ));
    }

    let access_claims = Claims::new(
        claims.sub.clone(),
        claims.email.clone(),
        claims.role.clone(),
        claims.status.clone(),
        TokenKind::Access,
        now_unix_seconds(),
        auth_state.config().access_token_ttl_seconds(),
    );
    let access_token = encode(secret, &access_claims)
        .map_err(|err| ApiError::Internal(anyhow!(err).context("failed to mint access token")))?;

    info!(user_id = %claims.sub, "access token refreshed");

    Ok(Json(RefreshTokenResponse {
        status: "success".to_string(),
        access_token,
    }))
}
