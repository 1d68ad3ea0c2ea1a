//! # Sertika (Business Certification Portal API)
//!
//! `sertika` is the authentication and session-security backend for a business
//! certification portal. Companies register with their tax and business
//! registration numbers, verify their email with a one-time code, and then
//! wait for document review before gaining full access.
//!
//! ## Accounts and Verification
//!
//! Registration creates a user and its company in one transaction; duplicate
//! email, NPWP, or NIB are rejected individually so the client can point at
//! the offending field. New accounts start as `pending_verification` and move
//! to `pending_document_verification` once the emailed six-digit code is
//! confirmed. Until then, login is refused.
//!
//! ## Session Security
//!
//! - **Tokens:** Short-lived `HS256` access tokens plus long-lived refresh
//!   tokens. Logout denylists the token's `jti` until its natural expiry.
//! - **CSRF:** A double-submit token tied to an `HttpOnly` session cookie,
//!   rotated on every successful state-changing request.
//! - **Rate limiting:** Failed logins and wrong verification codes are counted
//!   per client IP inside a fixed window; blocked callers get a retry hint.

pub mod api;
pub mod cli;
#[cfg(test)]
pub(crate) mod test_support;
pub mod token;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
