//! Authorization records and lifecycle state

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::Credential;

/// Default API scopes
pub mod scopes {
    /// Caller is unknown
    pub const API_ANONYMOUS: &str = "api:anonymous";
    /// The minimum for a proper client
    pub const API_READ: &str = "api:read";
    pub const API_WRITE: &str = "api:write";
    pub const API_EDIT: &str = "api:edit";
    pub const API_CREATE: &str = "api:create";
    pub const API_DELETE: &str = "api:delete";
    /// Admin-equivalent scope, satisfies any requirement
    pub const API_ADMIN: &str = "api:admin";
}

/// Lifecycle state of an authorization record.
///
/// ```text
/// Init ──confirm──▶ Authorized ──revoke──▶ Undefined
///   │                                          │
///   └──────────────revoke──────────────────────┘
/// any ──invalidate──▶ Invalid (sink)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Registered, confirmation pending
    Init,
    /// Failed validation; terminal without external remediation
    Invalid,
    /// Revoked / logged out
    #[default]
    Undefined,
    /// Confirmed and usable
    Authorized,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Init => "init",
            AuthState::Invalid => "invalid",
            AuthState::Undefined => "undefined",
            AuthState::Authorized => "authorized",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential plus the scopes granted to it and its lifecycle state.
///
/// One record exists per primary key (`account_realm`.`account_id`). The bearer
/// token is a secondary, time-bounded key that changes across transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    /// Endpoint of the service that issued the record
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,

    /// Explicitly granted scopes
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: BTreeSet<String>,

    /// Fallback scopes used when nothing was granted explicitly
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub default_scopes: BTreeSet<String>,

    pub credentials: Credential,

    #[serde(default)]
    pub state: AuthState,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_agent: String,

    /// Long-lived pre-shared secret of the calling application
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl AuthorizationRecord {
    pub fn new(credentials: Credential, api_key: impl Into<String>) -> Self {
        Self {
            credentials,
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_default_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_state(mut self, state: AuthState) -> Self {
        self.state = state;
        self
    }

    pub fn primary_key(&self) -> String {
        self.credentials.primary_key()
    }

    pub fn token(&self) -> &str {
        &self.credentials.token
    }

    /// Granted scopes, falling back to the default scopes.
    pub fn effective_scopes(&self) -> &BTreeSet<String> {
        if self.scopes.is_empty() {
            &self.default_scopes
        } else {
            &self.scopes
        }
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    /// Custom option value, empty if unset.
    pub fn option(&self, key: &str) -> &str {
        self.options.get(key).map(String::as_str).unwrap_or_default()
    }

    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }
}
