//! Observability for auth-gate.
//!
//! - `metrics` - Prometheus counters for chain outcomes and JWKS fetches

pub mod metrics;
