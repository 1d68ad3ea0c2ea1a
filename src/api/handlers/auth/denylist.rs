//! Revoked token storage.
//!
//! Logout stores the token's `jti` together with its original expiry; every
//! `require_auth` consults this table. Entries past their original expiry may
//! be purged at any time: an expired token is already rejected by the codec,
//! so revocation records only need to outlive the token itself.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{Instrument, error, info};

use crate::token::Claims;

/// Record a token as revoked. Idempotent: denying the same token twice is a
/// no-op.
pub(super) async fn deny(pool: &PgPool, claims: &Claims) -> Result<()> {
    let expires_at: DateTime<Utc> = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let query = r"
        INSERT INTO revoked_tokens (jti, expires_at)
        VALUES ($1, $2)
        ON CONFLICT (jti) DO NOTHING
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(&claims.jti)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert revoked token")?;
    Ok(())
}

/// Existence check consulted on every authenticated request.
pub(super) async fn is_denied(pool: &PgPool, jti: &str) -> Result<bool> {
    let query = "SELECT 1 FROM revoked_tokens WHERE jti = $1 LIMIT 1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(jti)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check revoked token")?;
    Ok(row.is_some())
}

/// Delete revocation records for tokens that have expired on their own.
pub(super) async fn purge_expired(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM revoked_tokens WHERE expires_at <= NOW()";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge revoked tokens")?;
    Ok(result.rows_affected())
}

/// Spawn a background task that periodically prunes expired denylist entries.
///
/// Housekeeping only: correctness never depends on this running.
pub fn spawn_purge_worker(pool: PgPool, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = if interval.is_zero() {
            Duration::from_secs(60)
        } else {
            interval
        };
        loop {
            tokio::time::sleep(interval).await;
            match purge_expired(&pool).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "pruned expired revoked tokens"),
                Err(err) => error!("revoked token purge failed: {err}"),
            }
        }
    })
}
