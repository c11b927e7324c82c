//! Authorization lifecycle handlers: init, login, logout, whoami.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::info;

use crate::api::error::{invalid_body, ApiError};
use crate::api::types::{InitRequest, StatusObject, WhoAmIResponse};
use crate::auth::{bearer_token, AuthorizationExt};
use crate::server::AppState;

/// `POST /a/v1/auth`: start a registration.
///
/// The confirmation token goes out through the notifier, never in the response.
pub async fn init(
    State(state): State<AppState>,
    body: Result<Json<InitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatusObject>), ApiError> {
    let Json(request) = body.map_err(|e| invalid_body(e.body_text()))?;

    let registration = state
        .service
        .register(&request.account_id, &request.api_key)
        .await?;

    let message = format!(
        "confirmation sent, valid for {}s",
        registration.confirmation_window.as_secs()
    );
    Ok((
        StatusCode::CREATED,
        Json(StatusObject::new(StatusCode::CREATED, message)),
    ))
}

/// `GET /a/v1/auth/:sig/:token`: trade a confirmation token for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Path((sig, token)): Path<(String, String)>,
) -> Result<Json<StatusObject>, ApiError> {
    let bearer = state.service.confirm(&token, &sig)?;
    Ok(Json(StatusObject::new(StatusCode::OK, bearer)))
}

/// `DELETE /a/v1/auth/:sig`: revoke the bearer token of the request.
pub async fn logout(
    State(state): State<AppState>,
    Path(sig): Path<String>,
    headers: HeaderMap,
) -> Result<Json<StatusObject>, ApiError> {
    let token = bearer_token(&headers)?;
    state.service.revoke(token, &sig)?;
    Ok(Json(StatusObject::new(StatusCode::OK, "logged out")))
}

/// `GET /a/v1/whoami`: identity behind the bearer token.
pub async fn whoami(
    Extension(AuthorizationExt(record)): Extension<AuthorizationExt>,
) -> Json<WhoAmIResponse> {
    info!(key = %record.primary_key(), "whoami");
    Json(WhoAmIResponse::from(&record))
}
