//! Database-backed brute-force guard for auth flows.
//!
//! Failed attempts are counted per `(identifier, scope)` inside a sliding
//! window stored in `auth_attempts`. The counter update is a single atomic
//! upsert so concurrent failures from the same identifier never lose updates,
//! and state is shared across service instances through PostgreSQL.
//!
//! Per-scope keys keep lockouts independent: exhausting OTP guesses does not
//! block login for the same client, and vice versa.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

const LOGIN_MAX_ATTEMPTS: i32 = 5;
const OTP_VERIFY_MAX_ATTEMPTS: i32 = 10;
const WINDOW_SECONDS: i64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitScope {
    Login,
    OtpVerify,
}

impl RateLimitScope {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::OtpVerify => "otp_verify",
        }
    }

    pub(super) fn max_attempts(self) -> i32 {
        match self {
            Self::Login => LOGIN_MAX_ATTEMPTS,
            Self::OtpVerify => OTP_VERIFY_MAX_ATTEMPTS,
        }
    }

    pub(super) fn window_seconds(self) -> i64 {
        WINDOW_SECONDS
    }
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    pool: PgPool,
}

impl RateLimiter {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a failed attempt; restarts the window when the prior one lapsed.
    pub(super) async fn register_failure(
        &self,
        identifier: &str,
        scope: RateLimitScope,
    ) -> Result<()> {
        let query = r"
            INSERT INTO auth_attempts (identifier, scope, attempts, window_started_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (identifier, scope) DO UPDATE SET
                attempts = CASE
                    WHEN auth_attempts.window_started_at <= NOW() - ($3 * INTERVAL '1 second')
                    THEN 1
                    ELSE auth_attempts.attempts + 1
                END,
                window_started_at = CASE
                    WHEN auth_attempts.window_started_at <= NOW() - ($3 * INTERVAL '1 second')
                    THEN NOW()
                    ELSE auth_attempts.window_started_at
                END
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identifier)
            .bind(scope.as_str())
            .bind(scope.window_seconds())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to register auth failure")?;
        Ok(())
    }

    /// Remaining block time in seconds, or `None` when the identifier may try.
    ///
    /// A counter whose window has lapsed implicitly allows a fresh start; it is
    /// reset on the next `register_failure`, never proactively.
    pub(super) async fn blocked_seconds(
        &self,
        identifier: &str,
        scope: RateLimitScope,
    ) -> Result<Option<i64>> {
        let query = r"
            SELECT CEIL(EXTRACT(EPOCH FROM
                window_started_at + ($3 * INTERVAL '1 second') - NOW()
            ))::BIGINT AS retry_seconds
            FROM auth_attempts
            WHERE identifier = $1
              AND scope = $2
              AND attempts >= $4
              AND window_started_at > NOW() - ($3 * INTERVAL '1 second')
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identifier)
            .bind(scope.as_str())
            .bind(scope.window_seconds())
            .bind(scope.max_attempts())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to check auth attempts")?;

        Ok(row.map(|row| row.get::<i64, _>("retry_seconds").max(0)))
    }

    /// Reset the counter after a successful authenticated action.
    pub(super) async fn clear(&self, identifier: &str, scope: RateLimitScope) -> Result<()> {
        let query = "DELETE FROM auth_attempts WHERE identifier = $1 AND scope = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(identifier)
            .bind(scope.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to clear auth attempts")?;
        Ok(())
    }
}
