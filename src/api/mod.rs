//! API layer
//!
//! REST endpoints for the authorization lifecycle plus the structured error
//! type every endpoint answers with.

pub mod error;
pub mod handlers;
mod rest;
pub mod types;

pub use error::{ApiError, ErrorCode};
pub use rest::*;
