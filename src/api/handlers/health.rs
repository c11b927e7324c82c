//! Health check handler

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

/// Response for the health check endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Service name
    pub service: String,
    pub version: String,
    /// Records currently indexed
    pub credentials: usize,
    /// Whether records are written to disk
    pub durable: bool,
    pub timestamp: String,
}

/// Basic liveness endpoint; never touches the file system.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.service.store();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        credentials: store.len(),
        durable: store.root().is_some(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
