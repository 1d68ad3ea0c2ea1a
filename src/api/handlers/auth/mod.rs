//! Authentication and session security for the certification portal.
//!
//! Everything a browser client needs to establish and maintain an identity:
//! CSRF tokens, registration with email verification, password login,
//! token refresh, and logout with revocation. Handlers are thin; the
//! mechanics live in the sibling modules.

pub mod csrf;
pub mod denylist;
pub mod error;
pub mod login;
pub mod otp;
pub mod rate_limit;
pub mod refresh;
pub mod register;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;
pub mod utils;
pub mod verification;

pub use state::{AuthConfig, AuthState};
