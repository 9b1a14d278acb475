//! Token and key handling shared by the JWT verifiers.
//!
//! # Components
//!
//! - `token` - Compact JWS parsing, signature and claims checks
//! - `jwks` - Per-URL JWKS cache with throttled single-flight refresh
//! - `key_provider` - Key resolution from a token header

pub mod jwks;
pub mod key_provider;
pub mod token;

pub use jwks::{JwksCache, JwksError, KeySetSnapshot};
pub use key_provider::{JwksKeyFetcher, KeyFetcher, KeyLookupError, KeyProvider};
