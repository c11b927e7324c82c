//! apikit
//!
//! Authorization lifecycle and file-backed credential store for authenticated
//! API services: accounts register with a pre-shared API key, confirm with a
//! signature to obtain a bearer token, and present that token on every request.
//!
//! ## Modules
//!
//! - [`domain`] - Credentials, authorization records, lifecycle states, scopes
//! - [`infra`] - Durable credential store and process plumbing
//! - [`auth`] - Authorization service, signatures, token material, middleware
//! - [`api`] - REST routes and structured errors
//! - [`server`] - Configuration and HTTP bootstrap
//! - [`telemetry`] - Logging setup

pub mod api;
pub mod auth;
pub mod domain;
pub mod infra;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{signature, AuthError, AuthorizationService};
pub use domain::{AuthState, AuthorizationRecord, Credential};
pub use infra::{CredentialStore, ReloadReport, StoreError};
