//! OTP verification and resend endpoints.

use anyhow::Context;
use axum::{Json, extract::Extension, http::HeaderMap};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::api::email::EmailMessage;

use super::csrf;
use super::error::ApiError;
use super::otp::{self, OtpVerifyOutcome};
use super::rate_limit::{RateLimitScope, RateLimiter};
use super::state::AuthState;
use super::storage::{
    STATUS_PENDING_VERIFICATION, advance_status_after_otp, lookup_user_by_email,
};
use super::types::{ResendOtpRequest, ResendOtpResponse, VerifyOtpRequest, VerifyOtpResponse};
use super::utils::{client_identifier, normalize_email, valid_email, valid_otp_format};

/// Verify the emailed code and advance the account to document verification.
///
/// The code is single use; wrong guesses feed the per-IP brute-force counter.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted, account advanced", body = VerifyOtpResponse),
        (status = 400, description = "Invalid or expired code"),
        (status = 403, description = "CSRF mismatch"),
        (status = 404, description = "No active code for this email"),
        (status = 429, description = "Too many wrong guesses")
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }
    if !valid_otp_format(request.otp.trim()) {
        return Err(ApiError::Validation(
            "Verification code must be 6 digits".to_string(),
        ));
    }

    let session_hash =
        csrf::require_valid_token(&pool, &headers, request.csrf_token.as_deref()).await?;

    let identifier = client_identifier(&headers);
    let limiter = RateLimiter::new(pool.0.clone());
    if let Some(retry) = limiter
        .blocked_seconds(&identifier, RateLimitScope::OtpVerify)
        .await?
    {
        return Err(ApiError::rate_limited(
            "Too many verification attempts",
            Some(retry),
        ));
    }

    let mut tx = pool.begin().await.context("begin verify-otp transaction")?;
    match otp::verify_otp(&mut tx, &email, request.otp.trim()).await? {
        OtpVerifyOutcome::Verified => {
            // Rolling back keeps the code unconsumed when the account is
            // missing or already past email verification.
            if !advance_status_after_otp(&mut tx, &email).await? {
                let _ = tx.rollback().await;
                return Err(ApiError::Validation(
                    "Account is not awaiting email verification".to_string(),
                ));
            }
            tx.commit().await.context("commit verify-otp transaction")?;
        }
        OtpVerifyOutcome::NotFound => {
            let _ = tx.rollback().await;
            return Err(ApiError::NotFound(
                "No active verification code for this email".to_string(),
            ));
        }
        OtpVerifyOutcome::Expired => {
            let _ = tx.rollback().await;
            return Err(ApiError::Validation(
                "Verification code expired. Request a new one".to_string(),
            ));
        }
        OtpVerifyOutcome::Mismatch => {
            let _ = tx.rollback().await;
            limiter
                .register_failure(&identifier, RateLimitScope::OtpVerify)
                .await?;
            return Err(ApiError::Validation(
                "Invalid verification code".to_string(),
            ));
        }
    }

    limiter
        .clear(&identifier, RateLimitScope::OtpVerify)
        .await?;
    let csrf_token = csrf::rotate_token(&pool, &session_hash)
        .await
        .context("failed to rotate csrf token")?;

    info!(email = %email, "email verified");

    Ok(Json(VerifyOtpResponse {
        status: "success".to_string(),
        message: "Email verified. Your documents are now awaiting review".to_string(),
        csrf_token,
    }))
}

/// Issue a fresh verification code, subject to the resend cooldown.
#[utoipa::path(
    post,
    path = "/v1/auth/resend-otp",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "New code sent", body = ResendOtpResponse),
        (status = 400, description = "Account is not awaiting verification"),
        (status = 403, description = "CSRF mismatch"),
        (status = 404, description = "Unknown email"),
        (status = 429, description = "Cooldown still active, carries cooldown_seconds")
    ),
    tag = "auth"
)]
pub async fn resend_otp(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResendOtpRequest>>,
) -> Result<Json<ResendOtpResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }

    let session_hash =
        csrf::require_valid_token(&pool, &headers, request.csrf_token.as_deref()).await?;

    let Some(user) = lookup_user_by_email(&pool, &email).await? else {
        return Err(ApiError::NotFound("Account not found".to_string()));
    };
    if user.status != STATUS_PENDING_VERIFICATION {
        return Err(ApiError::Validation(
            "Account is not awaiting email verification".to_string(),
        ));
    }

    let cooldown = otp::cooldown_seconds(&pool, &email).await?;
    if cooldown > 0 {
        return Err(ApiError::rate_limited(
            "Please wait before requesting a new code",
            Some(cooldown),
        ));
    }

    let mut tx = pool.begin().await.context("begin resend-otp transaction")?;
    let code = otp::issue_otp(&mut tx, &email).await?;
    let message = EmailMessage::otp(&email, &user.display_name, &code);
    if let Err(err) = auth_state.email_sender().send(&message) {
        // Keep the old code (and its cooldown stamp) when delivery fails.
        let _ = tx.rollback().await;
        return Err(ApiError::Internal(
            err.context("failed to send verification code"),
        ));
    }
    tx.commit().await.context("commit resend-otp transaction")?;

    let csrf_token = csrf::rotate_token(&pool, &session_hash)
        .await
        .context("failed to rotate csrf token")?;

    info!(email = %email, "verification code resent");

    Ok(Json(ResendOtpResponse {
        status: "success".to_string(),
        message: "A new verification code is on its way".to_string(),
        csrf_token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    use crate::api::email::LogEmailSender;
    use crate::api::handlers::auth::state::AuthConfig;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://portal.sertika.dev".to_string()),
            SecretString::from("test-secret-at-least-32-bytes-long".to_string()),
            Arc::new(LogEmailSender),
        ))
    }

    #[tokio::test]
    async fn verify_otp_missing_payload() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_otp(HeaderMap::new(), Extension(pool), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_short_code() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_otp(
            HeaderMap::new(),
            Extension(pool),
            Some(Json(VerifyOtpRequest {
                email: "owner@example.com".to_string(),
                otp: "123".to_string(),
                csrf_token: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn resend_otp_missing_payload() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = resend_otp(
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
    async fn resend_otp_rejects_invalid_email() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = resend_otp(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(ResendOtpRequest {
                email: "not-an-email".to_string(),
                csrf_token: None,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
