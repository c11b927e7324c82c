//! Possession proof over (API key, token)
//!
//! `signature = hex(SHA-256(api_key || token))`. Only a party holding both the
//! pre-shared API key and the token can produce it, so intercepting a token alone
//! is not enough to confirm or revoke a session. It is not a MAC and relies on the
//! transport already being confidential (terminated TLS).

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compute the signature for `api_key` and `token`.
pub fn signature(api_key: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare a presented signature against the expected one in constant time.
pub fn verify_signature(api_key: &str, token: &str, presented: &str) -> bool {
    let expected = signature(api_key, token);
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}
