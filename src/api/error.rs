//! Structured API error responses with error codes
//!
//! Every failure leaving the service is an [`ApiError`]: a stable machine-readable
//! code, its numeric form and a message. Internal detail (paths, I/O errors) is
//! logged and never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::auth::AuthError;

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication errors (1xxx)
    /// No bearer token provided
    AuthRequired,
    /// Token unknown, invalid or lacking the required scope
    NotAuthorized,
    /// Token has expired
    TokenExpired,
    /// Confirmation token unknown
    TokenNotFound,

    // Validation errors (3xxx)
    /// Request body is malformed
    InvalidRequestBody,
    /// Identity or API key missing or malformed
    InvalidCredentials,
    /// Route declares no required scope
    ScopeRequired,

    // Conflict errors (5xxx)
    /// Account already holds a live authorization
    AlreadyAuthorized,

    // Signature errors (6xxx)
    /// Signature does not match
    InvalidSignature,

    // State errors (7xxx)
    /// Invalid state transition
    InvalidStateTransition,

    // Infrastructure errors (8xxx)
    /// Out-of-band notification could not be delivered
    NotificationFailed,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            ErrorCode::AuthRequired => 1001,
            ErrorCode::NotAuthorized => 1002,
            ErrorCode::TokenExpired => 1003,
            ErrorCode::TokenNotFound => 1004,

            ErrorCode::InvalidRequestBody => 3001,
            ErrorCode::InvalidCredentials => 3002,
            ErrorCode::ScopeRequired => 3003,

            ErrorCode::AlreadyAuthorized => 5001,

            ErrorCode::InvalidSignature => 6001,

            ErrorCode::InvalidStateTransition => 7001,

            ErrorCode::NotificationFailed => 8001,
            ErrorCode::InternalError => 8999,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::AuthRequired => StatusCode::UNAUTHORIZED,
            ErrorCode::NotAuthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::TokenExpired => StatusCode::UNAUTHORIZED,
            ErrorCode::TokenNotFound => StatusCode::NOT_FOUND,

            ErrorCode::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidCredentials => StatusCode::BAD_REQUEST,
            ErrorCode::ScopeRequired => StatusCode::BAD_REQUEST,

            ErrorCode::AlreadyAuthorized => StatusCode::CONFLICT,

            ErrorCode::InvalidSignature => StatusCode::BAD_REQUEST,

            ErrorCode::InvalidStateTransition => StatusCode::BAD_REQUEST,

            ErrorCode::NotificationFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::AuthRequired => "AUTH_REQUIRED",
            ErrorCode::NotAuthorized => "NOT_AUTHORIZED",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::TokenNotFound => "TOKEN_NOT_FOUND",
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::ScopeRequired => "SCOPE_REQUIRED",
            ErrorCode::AlreadyAuthorized => "ALREADY_AUTHORIZED",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::NotificationFailed => "NOTIFICATION_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetails,
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        // Add error code header for easier debugging
        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

// ============================================================================
// Conversion from AuthError
// ============================================================================

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NoToken => ApiError::new(ErrorCode::AuthRequired, "Missing bearer token"),
            AuthError::NoScope => {
                ApiError::new(ErrorCode::ScopeRequired, "No scope required by route")
            }
            AuthError::TokenNotFound => ApiError::new(ErrorCode::TokenNotFound, "Token not found"),
            AuthError::TokenExpired => ApiError::new(ErrorCode::TokenExpired, "Token expired"),
            AuthError::InvalidSignature => {
                ApiError::new(ErrorCode::InvalidSignature, "Invalid signature")
            }
            AuthError::InvalidCredentials(msg) => {
                ApiError::new(ErrorCode::InvalidCredentials, format!("Invalid credentials: {msg}"))
            }
            AuthError::AlreadyAuthorized => {
                ApiError::new(ErrorCode::AlreadyAuthorized, "Already authorized")
            }
            AuthError::NotAuthorized => ApiError::new(ErrorCode::NotAuthorized, "Not authorized"),
            AuthError::InvalidStateTransition { from, to } => ApiError::new(
                ErrorCode::InvalidStateTransition,
                format!("Invalid state transition: {from} -> {to}"),
            ),
            AuthError::Notification(msg) => {
                error!(error = %msg, "notification failed");
                ApiError::new(
                    ErrorCode::NotificationFailed,
                    "Confirmation could not be delivered",
                )
            }
            AuthError::Store(e) => {
                error!(error = %e, "credential store failure");
                internal_error("Internal error")
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Create a malformed body error
pub fn invalid_body(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InvalidRequestBody, message.into())
}

/// Create an internal error
pub fn internal_error(message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InternalError, message.into())
}

// ============================================================================
// Tests
// ============================================================================
