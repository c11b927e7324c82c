//! Authorization middleware for Axum
//!
//! Guards a route with a required scope and hands the caller's record to the
//! handler through request extensions.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AuthorizationService;
use crate::api::ApiError;
use crate::domain::AuthorizationRecord;

/// Authorized record of the current request
#[derive(Debug, Clone)]
pub struct AuthorizationExt(pub AuthorizationRecord);

/// Middleware state: the service plus the scope a route requires.
#[derive(Clone)]
pub struct ScopeGuard {
    pub service: Arc<AuthorizationService>,
    /// Comma-separated, every entry required
    pub scope: String,
}

impl ScopeGuard {
    pub fn new(service: Arc<AuthorizationService>, scope: impl Into<String>) -> Self {
        Self {
            service,
            scope: scope.into(),
        }
    }
}

/// Reject requests whose bearer token does not grant `guard.scope`.
///
/// Use with `axum::middleware::from_fn_with_state(ScopeGuard::new(..), require_scope)`.
pub async fn require_scope(
    State(guard): State<ScopeGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let record = match guard
        .service
        .check_authorization(request.headers(), &guard.scope)
    {
        Ok(record) => record,
        Err(e) => return ApiError::from(e).into_response(),
    };

    request.extensions_mut().insert(AuthorizationExt(record));
    next.run(request).await
}
