//! Bearer token extraction

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::AuthError;

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The header must consist of exactly two space-separated parts.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::NoToken)?
        .to_str()
        .map_err(|_| AuthError::NoToken)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::NoToken),
    }
}
