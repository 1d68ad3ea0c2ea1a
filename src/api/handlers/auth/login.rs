//! Password login endpoint.

use anyhow::{Context, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};
use axum::{Json, extract::Extension, http::HeaderMap};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::token::{Claims, TokenKind, encode};

use super::csrf;
use super::error::ApiError;
use super::rate_limit::{RateLimitScope, RateLimiter};
use super::state::AuthState;
use super::storage::{STATUS_PENDING_VERIFICATION, UserRecord, lookup_user_by_email};
use super::types::{LoginRequest, LoginResponse, UserInfo};
use super::utils::{client_identifier, normalize_email, now_unix_seconds, valid_email};

/// Authenticate with email and password, returning an access/refresh token
/// pair and a rotated CSRF token.
///
/// Order matters: the CSRF check and rate limiter run before any credential
/// work, and a successful login clears the caller's failure counter.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "CSRF mismatch or unverified account"),
        (status = 429, description = "Too many failed attempts")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }
    if request.password.is_empty() {
        return Err(ApiError::Validation("Missing password".to_string()));
    }

    let session_hash =
        csrf::require_valid_token(&pool, &headers, request.csrf_token.as_deref()).await?;

    let identifier = client_identifier(&headers);
    let limiter = RateLimiter::new(pool.0.clone());
    if let Some(retry) = limiter
        .blocked_seconds(&identifier, RateLimitScope::Login)
        .await?
    {
        // Blocked callers are refused before any credential work, even with
        // correct credentials.
        return Err(ApiError::rate_limited(
            "Too many failed login attempts",
            Some(retry),
        ));
    }

    let user = match lookup_user_by_email(&pool, &email).await? {
        Some(user) if password_matches(&user, &request.password) => user,
        _ => {
            limiter
                .register_failure(&identifier, RateLimitScope::Login)
                .await?;
            return Err(ApiError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }
    };

    if user.status == STATUS_PENDING_VERIFICATION {
        return Err(ApiError::Forbidden(
            "Email not verified. Check your inbox for the verification code".to_string(),
        ));
    }

    limiter.clear(&identifier, RateLimitScope::Login).await?;

    let now = now_unix_seconds();
    let secret = auth_state.token_secret();
    let access_claims = Claims::new(
        user.id.to_string(),
        user.email.clone(),
        user.role.clone(),
        user.status.clone(),
        TokenKind::Access,
        now,
        auth_state.config().access_token_ttl_seconds(),
    );
    let refresh_claims = Claims::new(
        user.id.to_string(),
        user.email.clone(),
        user.role.clone(),
        user.status.clone(),
        TokenKind::Refresh,
        now,
        auth_state.config().refresh_token_ttl_seconds(),
    );
    let token = encode(secret, &access_claims)
        .map_err(|err| ApiError::Internal(anyhow!(err).context("failed to mint access token")))?;
    let refresh_token = encode(secret, &refresh_claims)
        .map_err(|err| ApiError::Internal(anyhow!(err).context("failed to mint refresh token")))?;

    let csrf_token = csrf::rotate_token(&pool, &session_hash)
        .await
        .context("failed to rotate csrf token")?;

    info!(user_id = %user.id, "user logged in");

    Ok(Json(LoginResponse {
        status: "success".to_string(),
        message: "Login successful".to_string(),
        token,
        refresh_token,
        user: UserInfo {
            id: user.id.to_string(),
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            status: user.status,
        },
        csrf_token,
    }))
}

/// Argon2 verification against the stored PHC string. An unparsable stored
/// hash counts as a mismatch rather than an error.
fn password_matches(user: &UserRecord, password: &str) -> bool {
    PasswordHash::new(&user.password_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};
    use axum::response::IntoResponse;
    use axum::http::StatusCode;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    use crate::api::email::LogEmailSender;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::api::handlers::auth::storage::ROLE_COMPANY;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://portal.sertika.dev".to_string()),
            SecretString::from("test-secret-at-least-32-bytes-long".to_string()),
            Arc::new(LogEmailSender),
        ))
    }

    fn user_with_password(password: &str) -> anyhow::Result<UserRecord> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow::anyhow!("hash failed: {err}"))?;
        Ok(UserRecord {
            id: uuid::Uuid::new_v4(),
            email: "owner@example.com".to_string(),
            password_hash: hash.to_string(),
            display_name: "Owner".to_string(),
            role: ROLE_COMPANY.to_string(),
            status: "active".to_string(),
        })
    }

    #[test]
    fn password_matches_accepts_correct_password() -> anyhow::Result<()> {
        let user = user_with_password("correct horse battery staple")?;
        assert!(password_matches(&user, "correct horse battery staple"));
        assert!(!password_matches(&user, "wrong password"));
        Ok(())
    }

    #[test]
    fn password_matches_rejects_garbage_hash() {
        let user = UserRecord {
            id: uuid::Uuid::nil(),
            email: "owner@example.com".to_string(),
            password_hash: "not-a-phc-string".to_string(),
            display_name: "Owner".to_string(),
            role: ROLE_COMPANY.to_string(),
            status: "active".to_string(),
        };
        assert!(!password_matches(&user, "anything"));
    }

    #[tokio::test]
    async fn login_missing_payload() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_invalid_email() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = login(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(LoginRequest {
                email: "not-an-email".to_string(),
                password: "hunter2hunter2".to_string(),
                csrf_token: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
