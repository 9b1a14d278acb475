//! auth-gate: pluggable HTTP authentication middleware.
//!
//! Requests pass through an ordered chain of credential verifiers. The first
//! verifier that accepts a request lets it through, possibly attaching
//! verified identity data; if none accepts, the request is answered with the
//! error of the last verifier tried.
//!
//! # Architecture
//!
//! ```text
//! middleware/auth.rs -> chain.rs -> verifiers/*.rs -> auth/{token,key_provider,jwks}.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token codec, JWKS key store and key resolution
//! - `bootstrap` - Verifier chain assembly from configuration
//! - `chain` - Ordered verifier chain
//! - `config` - Configuration from `AUTH_*` environment variables
//! - `errors` - Request-path error type with HTTP status mapping
//! - `handlers` - Demo server HTTP handlers
//! - `middleware` - Axum authentication middleware
//! - `observability` - Prometheus metrics
//! - `routes` - Demo server router
//! - `verifiers` - API key, static JWT and JWKS verifiers

pub mod auth;
pub mod bootstrap;
pub mod chain;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod verifiers;

pub use chain::AuthChain;
pub use errors::AuthError;
pub use middleware::require_auth;
pub use verifiers::{IdentityContext, IdentityExt, Verifier};
