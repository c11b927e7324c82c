//! Token and key material

use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a fresh opaque bearer token.
///
/// 24 random bytes, URL-safe base64 without padding (32 chars), so the token
/// can travel in a path segment unescaped.
pub fn generate_token() -> String {
    let random_bytes: [u8; 24] = rand::thread_rng().gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generate a random passphrase to derive an API key from.
pub fn generate_passphrase() -> String {
    let random_bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(random_bytes)
}

/// Derive a client's pre-shared API key from its identity and a passphrase.
pub fn derive_api_key(account_realm: &str, account_id: &str, passphrase: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_realm.as_bytes());
    hasher.update(account_id.as_bytes());
    hasher.update(passphrase.as_bytes());
    hex::encode(hasher.finalize())
}
