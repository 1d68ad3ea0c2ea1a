//! Bearer-token session checks and logout.

use anyhow::Context;
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, header::AUTHORIZATION},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::token::{self, Claims};

use super::csrf;
use super::denylist;
use super::error::ApiError;
use super::state::AuthState;
use super::storage::lookup_user_by_email;
use super::types::{LogoutResponse, UserInfo};
use super::utils::{hash_token, now_unix_seconds};

/// Pull the bearer token out of the `Authorization` header.
pub(super) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Authenticate a request: valid signature, unexpired, and not denylisted.
///
/// This is the gate every protected endpoint goes through.
pub(super) async fn require_auth(
    pool: &PgPool,
    secret: &[u8],
    headers: &HeaderMap,
) -> Result<Claims, ApiError> {
    let Some(raw) = bearer_token(headers) else {
        return Err(ApiError::Unauthorized("Missing bearer token".to_string()));
    };
    let claims = token::decode(secret, raw, now_unix_seconds())
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
    if denylist::is_denied(pool, &claims.jti).await? {
        return Err(ApiError::Unauthorized("Token has been revoked".to_string()));
    }
    Ok(claims)
}

/// Return the authenticated caller's profile.
///
/// Reads the user fresh from the database so a status change since the token
/// was minted (say, document review completing) is visible immediately.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated user profile", body = UserInfo),
        (status = 401, description = "Missing, invalid, or revoked bearer token")
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<UserInfo>, ApiError> {
    let claims = require_auth(&pool, auth_state.token_secret(), &headers).await?;
    let Some(user) = lookup_user_by_email(&pool, &claims.email).await? else {
        return Err(ApiError::Unauthorized("Unknown account".to_string()));
    };
    Ok(Json(UserInfo {
        id: user.id.to_string(),
        email: user.email,
        display_name: user.display_name,
        role: user.role,
        status: user.status,
    }))
}

/// Revoke the caller's token and drop their CSRF session.
///
/// An expired token still gets a 200: logout is about ending up logged out,
/// and an expired token can no longer be used anyway, so no denylist row is
/// written for it. Any other decode failure is a 401.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session terminated", body = LogoutResponse),
        (status = 401, description = "No usable bearer token")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let Some(raw) = bearer_token(&headers) else {
        return Err(ApiError::Unauthorized("Missing bearer token".to_string()));
    };

    match token::decode(auth_state.token_secret(), raw, now_unix_seconds()) {
        Ok(claims) => {
            denylist::deny(&pool, &claims).await?;
            info!(jti = %claims.jti, "token revoked on logout");
        }
        Err(token::Error::Expired) => {
            // Already unusable, nothing to revoke.
        }
        Err(_) => {
            return Err(ApiError::Unauthorized("Invalid token".to_string()));
        }
    }

    if let Some(session_id) = csrf::extract_session_id(&headers) {
        csrf::delete_session(&pool, &hash_token(&session_id))
            .await
            .context("failed to delete csrf session")?;
    }

    Ok(Json(LogoutResponse {
        status: "success".to_string(),
        message: "Logged out".to_string(),
    }))
}
