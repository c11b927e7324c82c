//! Bearer credentials
//!
//! A [`Credential`] binds an account identity to an opaque bearer token and an
//! expiry marker. Expiry encoding:
//! - `0`: never expires
//! - `> 0`: absolute unix timestamp (seconds)
//! - `< 0`: explicitly invalidated

use serde::{Deserialize, Serialize};

/// Expiry marker meaning "never expires".
pub const NEVER_EXPIRES: i64 = 0;

/// Expiry marker for credentials that were explicitly invalidated.
pub const INVALIDATED: i64 = -1;

/// Account identity plus bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Project / tenant the account belongs to
    #[serde(default)]
    pub account_realm: String,

    /// User identifier inside the realm
    #[serde(default)]
    pub account_id: String,

    /// Opaque bearer value
    #[serde(default)]
    pub token: String,

    /// Expiry marker, see module docs
    #[serde(default)]
    pub expires_at: i64,
}

impl Credential {
    pub fn new(
        account_realm: impl Into<String>,
        account_id: impl Into<String>,
        token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            account_realm: account_realm.into(),
            account_id: account_id.into(),
            token: token.into(),
            expires_at,
        }
    }

    /// Primary key of the owning authorization record.
    pub fn primary_key(&self) -> String {
        primary_key(&self.account_realm, &self.account_id)
    }

    /// True when the expiry marker lies in the past relative to `now`.
    ///
    /// Only looks at `expires_at`, not at the other attributes.
    pub fn is_expired_at(&self, now: i64) -> bool {
        if self.expires_at == NEVER_EXPIRES {
            return false;
        }
        self.expires_at < now
    }

    /// Full validity check against `now`.
    ///
    /// Strict: a credential expiring exactly at `now` is no longer valid.
    pub fn is_valid_at(&self, now: i64) -> bool {
        if self.token.is_empty() || self.account_realm.is_empty() || self.account_id.is_empty() {
            return false;
        }
        if self.expires_at < 0 {
            return false;
        }
        self.expires_at == NEVER_EXPIRES || self.expires_at > now
    }

    /// Validity against the wall clock.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp())
    }
}

/// Primary key for a (realm, account id) pair.
pub fn primary_key(account_realm: &str, account_id: &str) -> String {
    format!("{account_realm}.{account_id}").to_lowercase()
}

/// Short prefix of a token, safe to put in logs.
pub fn token_hint(token: &str) -> &str {
    match token.char_indices().nth(6) {
        Some((idx, _)) => &token[..idx],
        None => token,
    }
}
