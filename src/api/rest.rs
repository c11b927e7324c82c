//! REST routes of the authorization service.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use super::handlers::{init, login, logout, whoami};
use crate::auth::{require_scope, AuthorizationService, ScopeGuard};
use crate::domain::scopes;
use crate::server::AppState;

/// Build the `/a/v1` router.
pub fn router(service: Arc<AuthorizationService>) -> Router<AppState> {
    let protected = Router::new()
        .route("/whoami", get(whoami))
        .route_layer(axum::middleware::from_fn_with_state(
            ScopeGuard::new(service, scopes::API_READ),
            require_scope,
        ));

    Router::new()
        .route("/auth", post(init))
        .route("/auth/:sig/:token", get(login))
        .route("/auth/:sig", delete(logout))
        .merge(protected)
}
