//! Authorization lifecycle
//!
//! Issues, confirms, revokes and checks bearer tokens on top of the
//! [`CredentialStore`](crate::infra::CredentialStore).
//!
//! # Flow
//!
//! 1. `register`: caller presents an account id and its pre-shared API key; a
//!    pending record with a short-lived confirmation token is stored and the token
//!    is delivered out-of-band through a [`Notifier`].
//! 2. `confirm`: caller presents the confirmation token plus
//!    `signature(api_key, token)` and receives a long-lived bearer token.
//! 3. Every protected request carries `Authorization: Bearer <token>` and is
//!    checked against the required scopes.
//! 4. `revoke`: the bearer token is soft-revoked (kept in the index, expired).
//!
//! # Scopes
//!
//! Required scopes are comma-separated and matched conjunctively by exact string
//! equality. `api:admin` satisfies any requirement.

mod bearer;
mod clock;
mod middleware;
mod notify;
mod service;
mod signing;
mod token;

pub use bearer::*;
pub use clock::*;
pub use middleware::*;
pub use notify::*;
pub use service::*;
pub use signing::*;
pub use token::*;

use crate::domain::AuthState;
use crate::infra::StoreError;

/// Authorization error
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no token provided")]
    NoToken,

    #[error("no scope provided")]
    NoScope,

    #[error("token not found")]
    TokenNotFound,

    #[error("token expired")]
    TokenExpired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("already authorized")]
    AlreadyAuthorized,

    #[error("not authorized")]
    NotAuthorized,

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: AuthState, to: AuthState },

    #[error("notification failed: {0}")]
    Notification(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoToken => AuthError::NoToken,
            StoreError::AlreadyAuthorized(_) => AuthError::AlreadyAuthorized,
            StoreError::Invalidated { attempted, .. } => AuthError::InvalidStateTransition {
                from: AuthState::Invalid,
                to: attempted,
            },
            StoreError::NotFound => AuthError::TokenNotFound,
            StoreError::InvalidRecord(msg) => AuthError::InvalidCredentials(msg),
            other => AuthError::Store(other),
        }
    }
}
