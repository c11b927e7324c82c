//! Error types for the credential store

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::AuthState;

/// Errors that can occur in the credential store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Empty token passed to a lookup
    #[error("no token provided")]
    NoToken,

    /// A live authorized record already exists under the primary key
    #[error("already authorized: {0}")]
    AlreadyAuthorized(String),

    /// The record under the primary key has been invalidated for good
    #[error("{key} is invalidated, cannot move to {attempted}")]
    Invalidated { key: String, attempted: AuthState },

    /// The token is already indexed under another primary key
    #[error("token already owned by {0}")]
    DuplicateToken(String),

    /// No record registered under the token
    #[error("record not found")]
    NotFound,

    /// Record is missing identity or token
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// File system failure
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be encoded or decoded
    #[error("serialization error at {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Serialization {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
