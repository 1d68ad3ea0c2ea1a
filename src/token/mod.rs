//! Signed bearer token codec (HS256).
//!
//! Tokens are three base64url segments (`header.claims.mac`) signed with a
//! server-held secret. Only HS256 is accepted on decode; tokens carrying any
//! other `alg` are rejected outright to prevent algorithm confusion.
//!
//! Expiry is checked against a caller-supplied unix timestamp so every
//! component in the service shares one clock source.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Token kind discriminator; claims without a `kind` field decode as access
/// tokens for backward compatibility with earlier issued tokens.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Access,
    Refresh,
}

/// Wire claim names follow the portal contract: the subject travels as
/// `user_id` and the kind discriminator as `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "user_id")]
    pub sub: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(rename = "type", default)]
    pub kind: TokenKind,
}

impl Claims {
    /// Build claims for a user with `iat = now` and `exp = now + ttl`.
    #[must_use]
    pub fn new(
        sub: impl Into<String>,
        email: impl Into<String>,
        role: impl Into<String>,
        status: impl Into<String>,
        kind: TokenKind,
        now_unix_seconds: i64,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            sub: sub.into(),
            email: email.into(),
            role: role.into(),
            status: status.into(),
            iat: now_unix_seconds,
            exp: now_unix_seconds.saturating_add(ttl_seconds),
            jti: uuid::Uuid::new_v4().to_string(),
            kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("token secret is not configured")]
    MissingSecret,
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac_for(secret: &[u8]) -> Result<HmacSha256, Error> {
    if secret.is_empty() {
        return Err(Error::MissingSecret);
    }
    HmacSha256::new_from_slice(secret).map_err(|_| Error::MissingSecret)
}

/// Create an HS256 signed token for the given claims.
///
/// # Errors
///
/// Returns `Error::MissingSecret` when the secret is empty, or a JSON error if
/// the header/claims cannot be encoded.
pub fn encode(secret: &[u8], claims: &Claims) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = mac_for(secret)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token does not have exactly three base64url/json segments,
/// - the header `alg` is anything but HS256,
/// - the MAC does not match (checked in constant time),
/// - the embedded expiry is at or before `now_unix_seconds`.
pub fn decode(secret: &[u8], token: &str, now_unix_seconds: i64) -> Result<Claims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = mac_for(secret)?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    // verify_slice performs a constant-time comparison.
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: Claims = b64d_json(claims_b64)?;
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-at-least-32-bytes-long";
    const NOW: i64 = 1_700_000_000;

    fn test_claims(kind: TokenKind) -> Claims {
        Claims::new(
            "3f6c5a1e-0000-4000-8000-000000000001",
            "owner@example.com",
            "company",
            "active",
            kind,
            NOW,
            3600,
        )
    }

    #[test]
    fn encode_decode_round_trip() -> Result<(), Error> {
        let claims = test_claims(TokenKind::Access);
        let token = encode(SECRET, &claims)?;
        assert_eq!(token.split('.').count(), 3);

        let decoded = decode(SECRET, &token, NOW + 1)?;
        assert_eq!(decoded, claims);
        Ok(())
    }

    #[test]
    fn rejects_after_expiry() -> Result<(), Error> {
        let claims = test_claims(TokenKind::Access);
        let token = encode(SECRET, &claims)?;
        let result = decode(SECRET, &token, NOW + 3600);
        assert!(matches!(result, Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn rejects_empty_secret() {
        let claims = test_claims(TokenKind::Access);
        assert!(matches!(encode(b"", &claims), Err(Error::MissingSecret)));
        assert!(matches!(
            decode(b"", "a.b.c", NOW),
            Err(Error::Base64) | Err(Error::MissingSecret)
        ));
    }

    #[test]
    fn rejects_wrong_secret() -> Result<(), Error> {
        let token = encode(SECRET, &test_claims(TokenKind::Access))?;
        let result = decode(b"another-secret-entirely-32-bytes!", &token, NOW + 1);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_tampered_claims() -> Result<(), Error> {
        let token = encode(SECRET, &test_claims(TokenKind::Access))?;
        let mut parts: Vec<&str> = token.split('.').collect();

        let mut forged = test_claims(TokenKind::Access);
        forged.role = "admin".to_string();
        let forged_b64 = b64e_json(&forged)?;
        parts[1] = &forged_b64;
        let tampered = parts.join(".");

        let result = decode(SECRET, &tampered, NOW + 1);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(matches!(
            decode(SECRET, "only.two", NOW),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            decode(SECRET, "a.b.c.d", NOW),
            Err(Error::TokenFormat)
        ));
    }

    #[test]
    fn rejects_foreign_algorithm() -> Result<(), Error> {
        // Same claims, header rewritten to alg "none" with an empty signature.
        let claims_b64 = b64e_json(&test_claims(TokenKind::Access))?;
        let header_b64 = b64e_json(&TokenHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })?;
        let token = format!("{header_b64}.{claims_b64}.");
        let result = decode(SECRET, &token, NOW);
        assert!(matches!(result, Err(Error::UnsupportedAlg(alg)) if alg == "none"));
        Ok(())
    }

    #[test]
    fn kind_defaults_to_access_when_absent() -> Result<(), Error> {
        let json = serde_json::json!({
            "user_id": "u1",
            "email": "a@example.com",
            "role": "company",
            "status": "active",
            "iat": NOW,
            "exp": NOW + 60,
            "jti": "jti-1",
        });
        let claims: Claims = serde_json::from_value(json)?;
        assert_eq!(claims.kind, TokenKind::Access);
        Ok(())
    }

    #[test]
    fn refresh_kind_round_trips() -> Result<(), Error> {
        let token = encode(SECRET, &test_claims(TokenKind::Refresh))?;
        let decoded = decode(SECRET, &token, NOW + 1)?;
        assert_eq!(decoded.kind, TokenKind::Refresh);
        Ok(())
    }
}
