//! CSRF double-submit guard with rotation-on-use.
//!
//! Each client holds a random session id in an `HttpOnly` cookie; the current
//! anti-forgery token for that session lives in `csrf_sessions`, stored as a
//! SHA-256 digest. State-changing requests must present the token (header
//! `X-CSRF-Token` or body field `csrf_token`); on success the caller rotates
//! the token and returns the replacement, so a captured token cannot be
//! replayed across requests.
//!
//! Sessions are plain database rows rather than process memory, so validation
//! works across multiple service instances.

use anyhow::{Context, Result};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, error};

use super::error::ApiError;
use super::state::AuthState;
use super::types::CsrfTokenResponse;
use super::utils::{generate_opaque_token, hash_token};

const SESSION_COOKIE_NAME: &str = "sertika_session";
const CSRF_HEADER: &str = "x-csrf-token";

/// Issue (or refresh) the anti-forgery token for the caller's session.
#[utoipa::path(
    get,
    path = "/v1/auth/csrf-token",
    responses(
        (status = 200, description = "Anti-forgery token issued", body = CsrfTokenResponse),
        (status = 500, description = "Token could not be issued")
    ),
    tag = "auth"
)]
pub async fn csrf_token(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Reuse the caller's session when the cookie is present, otherwise mint one.
    let (session_id, is_new_session) = match extract_session_id(&headers) {
        Some(session_id) => (session_id, false),
        None => match generate_opaque_token() {
            Ok(session_id) => (session_id, true),
            Err(err) => {
                error!("failed to generate csrf session id: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    let token = match issue_token(&pool, &hash_token(&session_id)).await {
        Ok(token) => token,
        Err(err) => {
            error!("failed to issue csrf token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    if is_new_session
        && let Ok(cookie) = session_cookie(auth_state.config().session_cookie_secure(), &session_id)
    {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let body = CsrfTokenResponse {
        status: "success".to_string(),
        csrf_token: token,
    };
    (StatusCode::OK, response_headers, Json(body)).into_response()
}

/// Generate a fresh token for the session and store only its hash.
pub(super) async fn issue_token(pool: &PgPool, session_hash: &[u8]) -> Result<String> {
    let token = generate_opaque_token()?;
    let token_hash = hash_token(&token);
    let query = r"
        INSERT INTO csrf_sessions (session_hash, csrf_token_hash)
        VALUES ($1, $2)
        ON CONFLICT (session_hash) DO UPDATE SET
            csrf_token_hash = EXCLUDED.csrf_token_hash,
            updated_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session_hash)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store csrf token")?;
    Ok(token)
}

/// Validate the presented anti-forgery token for this request's session.
///
/// Returns the session hash so the caller can rotate the token afterwards.
/// Any missing piece (cookie, token, session row) or a token mismatch is a
/// hard 403. The comparison runs over fixed-length SHA-256 digests, never over
/// the raw token.
pub(super) async fn require_valid_token(
    pool: &PgPool,
    headers: &HeaderMap,
    body_token: Option<&str>,
) -> Result<Vec<u8>, ApiError> {
    let Some(session_id) = extract_session_id(headers) else {
        return Err(ApiError::Forbidden("Missing session".to_string()));
    };
    let Some(presented) = presented_token(headers, body_token) else {
        return Err(ApiError::Forbidden("Missing CSRF token".to_string()));
    };

    let session_hash = hash_token(&session_id);
    let query = "SELECT csrf_token_hash FROM csrf_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&session_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup csrf session")?;

    let Some(row) = row else {
        return Err(ApiError::Forbidden("Invalid CSRF token".to_string()));
    };
    let stored_hash: Vec<u8> = row.get("csrf_token_hash");
    if stored_hash != hash_token(&presented) {
        return Err(ApiError::Forbidden("Invalid CSRF token".to_string()));
    }

    Ok(session_hash)
}

/// Rotation-on-use: replace the consumed token and return the new value.
pub(super) async fn rotate_token(pool: &PgPool, session_hash: &[u8]) -> Result<String> {
    issue_token(pool, session_hash).await
}

/// Drop the CSRF session entirely (logout). Idempotent.
pub(super) async fn delete_session(pool: &PgPool, session_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM csrf_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete csrf session")?;
    Ok(())
}

pub(super) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn presented_token(headers: &HeaderMap, body_token: Option<&str>) -> Option<String> {
    let header_token = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    if header_token.is_some() {
        return header_token;
    }
    body_token
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Build a secure `HttpOnly` cookie carrying the session id.
fn session_cookie(secure: bool, session_id: &str) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
