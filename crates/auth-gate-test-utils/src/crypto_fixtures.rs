//! Deterministic cryptographic fixtures for testing
//!
//! Provides reproducible Ed25519 keypairs, their JWK and PEM renderings, and
//! a fixed HMAC secret. All fixtures are deterministic based on seed values.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::Serialize;

/// Shared secret used by HS256 fixtures.
pub const TEST_HMAC_SECRET: &[u8] = b"auth-gate-test-hmac-secret-0123456789";

/// DER prefix of an Ed25519 SubjectPublicKeyInfo (RFC 8410).
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Deterministic Ed25519 keypair with a key ID.
#[derive(Clone)]
pub struct TestKeypair {
    pub kid: String,
    pub public_key_bytes: Vec<u8>,
    pub private_key_pkcs8: Vec<u8>,
}

/// Generate a deterministic Ed25519 keypair for testing.
///
/// The same seed always produces the same keypair.
pub fn test_ed25519_keypair(seed: u8, kid: &str) -> TestKeypair {
    // Create deterministic 32-byte seed from input
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }

    let key_pair =
        Ed25519KeyPair::from_seed_unchecked(&seed_bytes).expect("Failed to create test keypair");

    TestKeypair {
        kid: kid.to_string(),
        public_key_bytes: key_pair.public_key().as_ref().to_vec(),
        private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
    }
}

impl TestKeypair {
    /// Sign `claims` as an EdDSA JWT carrying this keypair's `kid`.
    pub fn sign_token<T: Serialize>(&self, claims: &T) -> String {
        self.sign_token_with_kid(claims, Some(&self.kid))
    }

    /// Sign `claims` with an arbitrary (or absent) `kid` header.
    pub fn sign_token_with_kid<T: Serialize>(&self, claims: &T, kid: Option<&str>) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = kid.map(ToString::to_string);

        encode(&header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// JWK rendering suitable for a JWKS document.
    pub fn jwk_json(&self) -> serde_json::Value {
        serde_json::json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }

    /// JWK rendering without an `alg` member.
    pub fn jwk_json_without_alg(&self) -> serde_json::Value {
        let mut jwk = self.jwk_json();
        if let Some(obj) = jwk.as_object_mut() {
            obj.remove("alg");
        }
        jwk
    }

    /// SubjectPublicKeyInfo PEM for the public key.
    pub fn public_key_pem(&self) -> String {
        let mut der = ED25519_SPKI_PREFIX.to_vec();
        der.extend_from_slice(&self.public_key_bytes);
        format!(
            "-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----\n",
            STANDARD.encode(der)
        )
    }
}

/// Build PKCS#8 v1 document from Ed25519 seed
///
/// This is a test-only utility.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::new();

    // Outer SEQUENCE tag
    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE, OID 1.3.101.112
    pkcs8.push(0x30);
    pkcs8.push(0x05);
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING wrapping OCTET STRING with seed
    pkcs8.push(0x04);
    pkcs8.push(0x22);
    pkcs8.push(0x04);
    pkcs8.push(0x20);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

/// Flip one bit in the middle of a compact token's signature.
pub fn flip_signature_bit(token: &str) -> String {
    let (signing_input, signature) = token.rsplit_once('.').expect("compact token");
    let mut bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .expect("signature should be base64url");
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x01;
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(bytes))
}
