//! Small helpers for auth validation, token hashing, and clock access.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::time::SystemTime;

/// Unix seconds from the server clock.
///
/// Every in-process expiry comparison (token codec, cooldowns) goes through
/// this single helper; database-side comparisons use `NOW()` uniformly.
pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// NPWP is a 15 or 16 digit Indonesian tax number.
pub(super) fn valid_npwp(npwp: &str) -> bool {
    Regex::new(r"^[0-9]{15,16}$").is_ok_and(|regex| regex.is_match(npwp))
}

/// NIB is a 13 digit business identification number.
pub(super) fn valid_nib(nib: &str) -> bool {
    Regex::new(r"^[0-9]{13}$").is_ok_and(|regex| regex.is_match(nib))
}

/// OTP codes are exactly six digits.
pub(super) fn valid_otp_format(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Create a new random opaque token (CSRF token, CSRF session id).
/// The raw value is only returned to the client; the database stores a hash.
pub(super) fn generate_opaque_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate opaque token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash an opaque token (CSRF token, session id, OTP code) so raw values never
/// touch the database. Lookups and comparisons run over these fixed-length
/// digests, never over the raw secrets.
pub(super) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Name of the violated unique constraint, when the database reports one.
pub(super) fn unique_violation_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if is_unique_violation(err) => {
            db_err.constraint().map(str::to_string)
        }
        _ => None,
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Rate-limit identifier for the request: client IP or a shared bucket.
pub(super) fn client_identifier(headers: &axum::http::HeaderMap) -> String {
    extract_client_ip(headers).unwrap_or_else(|| "unknown".to_string())
}
