//! Company registration endpoint.

use anyhow::Context;
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use axum::{Json, extract::Extension, http::HeaderMap};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::api::email::EmailMessage;

use super::csrf;
use super::error::ApiError;
use super::otp;
use super::state::AuthState;
use super::storage::{NewRegistration, RegisterOutcome, insert_user_and_company};
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{normalize_email, valid_email, valid_nib, valid_npwp};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Register a new company account in `pending_verification` state and send a
/// verification code.
///
/// User, company, and OTP rows share one transaction: a duplicate unique field
/// or a failed email send leaves nothing behind.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification code sent", body = RegisterResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "CSRF mismatch"),
        (status = 409, description = "Duplicate email, NPWP, or NIB")
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<(axum::http::StatusCode, Json<RegisterResponse>), ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    validate(&request, &email)?;

    let session_hash =
        csrf::require_valid_token(&pool, &headers, request.csrf_token.as_deref()).await?;

    let password_hash = hash_password(&request.password)?;
    let registration = NewRegistration {
        email: email.clone(),
        password_hash,
        display_name: request.display_name.trim().to_string(),
        company_name: request.company.name.trim().to_string(),
        npwp: request.company.npwp.trim().to_string(),
        nib: request.company.nib.trim().to_string(),
        address: request.company.address.trim().to_string(),
    };

    let mut tx = pool.begin().await.context("begin register transaction")?;
    match insert_user_and_company(&mut tx, &registration).await? {
        RegisterOutcome::Created => {}
        RegisterOutcome::DuplicateEmail => {
            let _ = tx.rollback().await;
            return Err(ApiError::Conflict("Email is already registered".to_string()));
        }
        RegisterOutcome::DuplicateNpwp => {
            let _ = tx.rollback().await;
            return Err(ApiError::Conflict("NPWP is already registered".to_string()));
        }
        RegisterOutcome::DuplicateNib => {
            let _ = tx.rollback().await;
            return Err(ApiError::Conflict("NIB is already registered".to_string()));
        }
    }

    let code = otp::issue_otp(&mut tx, &email).await?;
    let message = EmailMessage::otp(&email, &registration.display_name, &code);
    if let Err(err) = auth_state.email_sender().send(&message) {
        // Delivery failure rolls back the whole registration; the caller can
        // simply retry.
        let _ = tx.rollback().await;
        return Err(ApiError::Internal(
            err.context("failed to send verification code"),
        ));
    }
    tx.commit().await.context("commit register transaction")?;

    let csrf_token = csrf::rotate_token(&pool, &session_hash)
        .await
        .context("failed to rotate csrf token")?;

    info!(email = %email, "company registration created");

    Ok((
        axum::http::StatusCode::CREATED,
        Json(RegisterResponse {
            status: "success".to_string(),
            message: "Registration received. Check your inbox for the verification code"
                .to_string(),
            csrf_token,
        }),
    ))
}

fn validate(request: &RegisterRequest, email_normalized: &str) -> Result<(), ApiError> {
    if !valid_email(email_normalized) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }
    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if request.display_name.trim().is_empty() {
        return Err(ApiError::Validation("Missing display name".to_string()));
    }
    if request.company.name.trim().is_empty() {
        return Err(ApiError::Validation("Missing company name".to_string()));
    }
    if !valid_npwp(request.company.npwp.trim()) {
        return Err(ApiError::Validation(
            "NPWP must be 15 or 16 digits".to_string(),
        ));
    }
    if !valid_nib(request.company.nib.trim()) {
        return Err(ApiError::Validation("NIB must be 13 digits".to_string()));
    }
    if request.company.address.trim().is_empty() {
        return Err(ApiError::Validation("Missing company address".to_string()));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(anyhow::anyhow!("failed to hash password: {err}")))
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
    use crate::api::handlers::auth::types::CompanyPayload;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("https://portal.sertika.dev".to_string()),
            SecretString::from("test-secret-at-least-32-bytes-long".to_string()),
            Arc::new(LogEmailSender),
        ))
    }

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            email: "owner@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            display_name: "Budi".to_string(),
            company: CompanyPayload {
                name: "PT Maju Jaya".to_string(),
                npwp: "012345678901234".to_string(),
                nib: "1234567890123".to_string(),
                address: "Jl. Sudirman 1, Jakarta".to_string(),
            },
            csrf_token: None,
        }
    }

    #[test]
    fn validate_accepts_complete_request() {
        let request = valid_request();
        assert!(validate(&request, "owner@example.com").is_ok());
    }

    #[test]
    fn validate_rejects_short_password() {
        let mut request = valid_request();
        request.password = "short".to_string();
        assert!(validate(&request, "owner@example.com").is_err());
    }

    #[test]
    fn validate_rejects_bad_npwp_and_nib() {
        let mut request = valid_request();
        request.company.npwp = "123".to_string();
        assert!(validate(&request, "owner@example.com").is_err());

        let mut request = valid_request();
        request.company.nib = "123".to_string();
        assert!(validate(&request, "owner@example.com").is_err());
    }

    #[test]
    fn hash_password_produces_verifiable_phc() -> anyhow::Result<()> {
        use argon2::password_hash::{PasswordHash, PasswordVerifier};

        let hash = hash_password("hunter2hunter2").map_err(|err| anyhow::anyhow!("{err}"))?;
        let parsed = PasswordHash::new(&hash).map_err(|err| anyhow::anyhow!("{err}"))?;
        assert!(
            Argon2::default()
                .verify_password(b"hunter2hunter2", &parsed)
                .is_ok()
        );
        Ok(())
    }

    #[tokio::test]
    async fn register_missing_payload() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = register(
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
    async fn register_invalid_payload() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut request = valid_request();
        request.email = "nope".to_string();
        let response = register(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth_state()),
            Some(Json(request)),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
