//! API route handlers.
//!
//! Auth endpoints live under [`auth`]; [`health`] and [`root`] cover the
//! service surface around them.

pub mod auth;
pub mod health;
pub mod root;
