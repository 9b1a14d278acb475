//! Builder patterns for test claims and tokens

use crate::crypto_fixtures::TEST_HMAC_SECRET;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// JWT claims for test tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TestClaims {
    /// Claims valid for one hour.
    pub fn valid(sub: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            scope: None,
        }
    }

    /// Claims that expired an hour ago.
    pub fn expired(sub: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.to_string(),
            exp: (now - Duration::seconds(3600)).timestamp(),
            iat: (now - Duration::seconds(7200)).timestamp(),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }
}

/// Sign `claims` with HS256 and [`TEST_HMAC_SECRET`].
pub fn hs256_token<T: Serialize>(claims: &T) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(TEST_HMAC_SECRET),
    )
    .expect("Failed to sign HS256 token")
}
