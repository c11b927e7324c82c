//! Domain models for the authorization subsystem
//!
//! - [`Credential`]: account identity, bearer token and expiry marker
//! - [`AuthorizationRecord`]: credential plus scopes and lifecycle state

mod credential;
mod record;

pub use credential::*;
pub use record::*;
