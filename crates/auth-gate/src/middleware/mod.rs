//! HTTP middleware for auth-gate.

pub mod auth;

pub use auth::require_auth;
