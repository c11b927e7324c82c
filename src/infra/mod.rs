//! Infrastructure layer
//!
//! - Credential store (in-memory indexes over one JSON file per record)
//! - File helpers (atomic writes, recursive cold-start walk)
//! - Graceful shutdown (signal handling)

mod error;
pub mod files;
mod graceful_shutdown;
mod store;

pub use error::*;
pub use graceful_shutdown::shutdown_signal;
pub use store::{CredentialStore, ReloadReport};
