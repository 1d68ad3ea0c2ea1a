//! Request/response types for auth endpoints.
//!
//! Every success response carries `status = "success"`; mutating responses
//! also carry the rotated `csrf_token` for the next request.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CsrfTokenResponse {
    pub status: String,
    pub csrf_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub csrf_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub status: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub status: String,
    pub message: String,
    pub token: String,
    pub refresh_token: String,
    pub user: UserInfo,
    pub csrf_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CompanyPayload {
    pub name: String,
    pub npwp: String,
    pub nib: String,
    pub address: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub company: CompanyPayload,
    pub csrf_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub status: String,
    pub message: String,
    pub csrf_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    pub csrf_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpResponse {
    pub status: String,
    pub message: String,
    pub csrf_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendOtpRequest {
    pub email: String,
    pub csrf_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendOtpResponse {
    pub status: String,
    pub message: String,
    pub csrf_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshTokenResponse {
    pub status: String,
    pub access_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    pub status: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_request_round_trips() -> Result<()> {
        let request = LoginRequest {
            email: "owner@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            csrf_token: Some("token".to_string()),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "owner@example.com");
        let decoded: LoginRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.csrf_token.as_deref(), Some("token"));
        Ok(())
    }

    #[test]
    fn register_request_accepts_missing_csrf_field() -> Result<()> {
        let value = serde_json::json!({
            "email": "owner@example.com",
            "password": "hunter2hunter2",
            "display_name": "Budi",
            "company": {
                "name": "PT Maju Jaya",
                "npwp": "012345678901234",
                "nib": "1234567890123",
                "address": "Jl. Sudirman 1, Jakarta"
            }
        });
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.company.nib, "1234567890123");
        assert!(decoded.csrf_token.is_none());
        Ok(())
    }

    #[test]
    fn error_free_refresh_request_round_trips() -> Result<()> {
        let request = RefreshTokenRequest {
            refresh_token: "a.b.c".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let decoded: RefreshTokenRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.refresh_token, "a.b.c");
        Ok(())
    }
}
