//! Database helpers for user and company records.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::unique_violation_constraint;

pub(super) const STATUS_PENDING_VERIFICATION: &str = "pending_verification";
pub(super) const STATUS_PENDING_DOCUMENT_VERIFICATION: &str = "pending_document_verification";
pub(super) const ROLE_COMPANY: &str = "company";

/// Fields persisted for a new registration (company applicant).
pub(super) struct NewRegistration {
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) display_name: String,
    pub(super) company_name: String,
    pub(super) npwp: String,
    pub(super) nib: String,
    pub(super) address: String,
}

/// Outcome when attempting to create a new user + company pair.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum RegisterOutcome {
    Created,
    DuplicateEmail,
    DuplicateNpwp,
    DuplicateNib,
}

/// Fields needed to authenticate and mint tokens.
pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) password_hash: String,
    pub(super) display_name: String,
    pub(super) role: String,
    pub(super) status: String,
}

pub(super) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, email, password_hash, display_name, role::text AS role, status::text AS status
        FROM users
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
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        role: row.get("role"),
        status: row.get("status"),
    }))
}

/// Insert the user and its company in one transaction-scoped unit.
///
/// On any duplicate unique field nothing is persisted; the violated
/// constraint decides which `Duplicate*` outcome the caller reports.
pub(super) async fn insert_user_and_company(
    tx: &mut Transaction<'_, Postgres>,
    registration: &NewRegistration,
) -> Result<RegisterOutcome> {
    let query = r"
        INSERT INTO users (email, password_hash, display_name, role, status)
        VALUES ($1, $2, $3, 'company', 'pending_verification')
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(&registration.email)
        .bind(&registration.password_hash)
        .bind(&registration.display_name)
        .fetch_one(&mut **tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if let Some(outcome) = duplicate_outcome(&err) {
                return Ok(outcome);
            }
            return Err(err).context("failed to insert user");
        }
    };

    let query = r"
        INSERT INTO companies (user_id, name, npwp, nib, address)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(&registration.company_name)
        .bind(&registration.npwp)
        .bind(&registration.nib)
        .bind(&registration.address)
        .execute(&mut **tx)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(RegisterOutcome::Created),
        Err(err) => {
            if let Some(outcome) = duplicate_outcome(&err) {
                return Ok(outcome);
            }
            Err(err).context("failed to insert company")
        }
    }
}

/// Advance the user after OTP verification.
///
/// Only fires for `pending_verification`; returns false when the user is
/// absent or already past that stage.
pub(super) async fn advance_status_after_otp(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
) -> Result<bool> {
    let query = r"
        UPDATE users
        SET status = 'pending_document_verification',
            updated_at = NOW()
        WHERE email = $1
          AND status = 'pending_verification'
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to advance user status")?;
    Ok(row.is_some())
}

fn duplicate_outcome(err: &sqlx::Error) -> Option<RegisterOutcome> {
    let constraint = unique_violation_constraint(err)?;
    match constraint.as_str() {
        "users_email_key" => Some(RegisterOutcome::DuplicateEmail),
        "companies_npwp_key" => Some(RegisterOutcome::DuplicateNpwp),
        "companies_nib_key" => Some(RegisterOutcome::DuplicateNib),
        // Unknown unique constraint: treat as an email conflict rather than
        // leaking constraint names to the caller.
        _ => Some(RegisterOutcome::DuplicateEmail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_outcome_debug_names() {
        assert_eq!(format!("{:?}", RegisterOutcome::Created), "Created");
        assert_eq!(
            format!("{:?}", RegisterOutcome::DuplicateEmail),
            "DuplicateEmail"
        );
        assert_eq!(
            format!("{:?}", RegisterOutcome::DuplicateNpwp),
            "DuplicateNpwp"
        );
        assert_eq!(
            format!("{:?}", RegisterOutcome::DuplicateNib),
            "DuplicateNib"
        );
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            id: Uuid::nil(),
            email: "owner@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            display_name: "Owner".to_string(),
            role: ROLE_COMPANY.to_string(),
            status: STATUS_PENDING_VERIFICATION.to_string(),
        };
        assert_eq!(record.id, Uuid::nil());
        assert_eq!(record.role, "company");
        assert_eq!(record.status, "pending_verification");
    }

    #[test]
    fn status_constants_are_distinct() {
        assert_ne!(
            STATUS_PENDING_VERIFICATION,
            STATUS_PENDING_DOCUMENT_VERIFICATION
        );
    }
}
