//! One-time code issuance and verification.
//!
//! Codes are six random digits, stored only as a SHA-256 hash together with an
//! expiry and a `last_sent_at` timestamp for resend throttling. The table is
//! keyed by email, so issuing a new code supersedes the prior one and at most
//! one active record exists per address. Verification is single-use: a
//! consumed code reads as absent on the next attempt.
//!
//! Expiry here is a lazy time comparison against `NOW()`; nothing evicts
//! records proactively.

use anyhow::{Context, Result};
use rand::{Rng, rngs::OsRng};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::Instrument;

use super::utils::hash_token;

pub(super) const OTP_TTL_SECONDS: i64 = 10 * 60;
pub(super) const OTP_RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Outcome of a verification attempt, mirrored by the endpoint's responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum OtpVerifyOutcome {
    Verified,
    NotFound,
    Expired,
    Mismatch,
}

/// Issue a fresh code for the email, replacing any prior unconsumed one.
///
/// Runs inside the caller's transaction: if delivery fails, the caller rolls
/// back and the old record (and its cooldown stamp) survives untouched.
pub(super) async fn issue_otp(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
) -> Result<String> {
    let code = generate_code()?;
    let code_hash = hash_token(&code);

    let query = r"
        INSERT INTO email_otps (email, code_hash, expires_at, last_sent_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'), NOW())
        ON CONFLICT (email) DO UPDATE SET
            code_hash = EXCLUDED.code_hash,
            created_at = NOW(),
            expires_at = EXCLUDED.expires_at,
            consumed_at = NULL,
            last_sent_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(code_hash)
        .bind(OTP_TTL_SECONDS)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to store otp")?;

    Ok(code)
}

/// Verify a submitted code and consume it on success.
///
/// The row is locked for the duration of the transaction so two concurrent
/// submissions of the same code cannot both succeed.
pub(super) async fn verify_otp(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    submitted_code: &str,
) -> Result<OtpVerifyOutcome> {
    let query = r"
        SELECT code_hash, (expires_at <= NOW()) AS expired
        FROM email_otps
        WHERE email = $1
          AND consumed_at IS NULL
        FOR UPDATE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to lookup otp")?;

    let Some(row) = row else {
        return Ok(OtpVerifyOutcome::NotFound);
    };

    if row.get::<bool, _>("expired") {
        return Ok(OtpVerifyOutcome::Expired);
    }

    let stored_hash: Vec<u8> = row.get("code_hash");
    if stored_hash != hash_token(submitted_code) {
        return Ok(OtpVerifyOutcome::Mismatch);
    }

    let query = "UPDATE email_otps SET consumed_at = NOW() WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to consume otp")?;

    Ok(OtpVerifyOutcome::Verified)
}

/// Seconds until a new code may be issued for this email, floored at zero.
pub(super) async fn cooldown_seconds(pool: &PgPool, email: &str) -> Result<i64> {
    let query = r"
        SELECT CEIL(GREATEST(0, $2 - EXTRACT(EPOCH FROM (NOW() - last_sent_at))))::BIGINT
            AS cooldown
        FROM email_otps
        WHERE email = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(OTP_RESEND_COOLDOWN_SECONDS)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check otp cooldown")?;

    Ok(row.map_or(0, |row| row.get::<i64, _>("cooldown").max(0)))
}

/// Six random decimal digits from OS randomness, leading zeros preserved.
fn generate_code() -> Result<String> {
    let value: u32 = OsRng.gen_range(0..1_000_000);
    Ok(format!("{value:06}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() -> Result<()> {
        for _ in 0..64 {
            let code = generate_code()?;
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
        Ok(())
    }

    #[test]
    fn code_hash_matches_submission_hash() -> Result<()> {
        let code = generate_code()?;
        assert_eq!(hash_token(&code), hash_token(code.as_str()));
        Ok(())
    }

    #[test]
    fn policy_constants() {
        assert_eq!(OTP_TTL_SECONDS, 600);
        assert_eq!(OTP_RESEND_COOLDOWN_SECONDS, 60);
    }
}
