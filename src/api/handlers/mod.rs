//! REST API handlers organized by domain.

pub mod auth;
pub mod health;

pub use auth::*;
pub use health::*;
