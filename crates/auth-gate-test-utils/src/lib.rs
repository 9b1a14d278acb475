//! # auth-gate Test Utilities
//!
//! Shared test utilities for the auth-gate middleware.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed Ed25519 keys, HMAC secret)
//! - Claims and token builders
//! - A mock JWKS endpoint backed by wiremock
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_gate_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let keypair = test_ed25519_keypair(1, "key-01");
//!     let server = MockJwksServer::start(&[keypair.jwk_json()]).await;
//!     let token = keypair.sign_token(&TestClaims::valid("alice"));
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;
