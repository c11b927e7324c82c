//! Shared request and response types for REST API handlers.

use std::collections::BTreeSet;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::{AuthState, AuthorizationRecord};

/// Plain status answer of the authorization endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusObject {
    pub status: u16,
    pub message: String,
}

impl StatusObject {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Request body for `POST /a/v1/auth`.
#[derive(Debug, Deserialize)]
pub struct InitRequest {
    pub account_id: String,
    pub api_key: String,
}

/// Response for `GET /a/v1/whoami`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub realm: String,
    pub account_id: String,
    pub scopes: BTreeSet<String>,
    pub state: AuthState,
}

impl From<&AuthorizationRecord> for WhoAmIResponse {
    fn from(record: &AuthorizationRecord) -> Self {
        Self {
            realm: record.credentials.account_realm.clone(),
            account_id: record.credentials.account_id.clone(),
            scopes: record.effective_scopes().clone(),
            state: record.state,
        }
    }
}
