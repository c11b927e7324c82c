//! HTTP server bootstrap for the authorization service.
//!
//! This module wires together:
//! - configuration
//! - the credential store (cold-start reload from disk)
//! - the authorization service
//! - the Axum router

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::handlers::health_check;
use crate::auth::{AuthorizationConfig, AuthorizationService, LogNotifier, LOGIN_EXPIRES_AFTER};
use crate::domain::scopes;
use crate::infra::{shutdown_signal, CredentialStore};
use crate::telemetry::{init_telemetry, TelemetryConfig};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Directory holding one file per record; `None` keeps everything in memory.
    pub credential_root: Option<PathBuf>,
    /// Realm assigned to registered accounts.
    pub realm: String,
    pub default_scopes: BTreeSet<String>,
    pub confirmation_window: Duration,
    /// Comma-separated CORS origins, `*` for any.
    pub cors_allow_origins: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {host}:{port}: {e}"))?;

        // CREDENTIAL_ROOT wins over CONFIG_LOCATION; an empty value means in-memory
        let credential_root = match std::env::var("CREDENTIAL_ROOT") {
            Ok(root) if root.trim().is_empty() => None,
            Ok(root) => Some(PathBuf::from(root)),
            Err(_) => {
                let location =
                    std::env::var("CONFIG_LOCATION").unwrap_or_else(|_| "./.config".to_string());
                Some(PathBuf::from(location).join("cred"))
            }
        };

        let realm = std::env::var("SERVICE_REALM")
            .ok()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

        let default_scopes = parse_scopes(
            &std::env::var("DEFAULT_SCOPES")
                .unwrap_or_else(|_| format!("{},{}", scopes::API_READ, scopes::API_WRITE)),
        );

        let confirmation_window = std::env::var("LOGIN_EXPIRES_AFTER_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(Duration::from_secs)
            .unwrap_or(LOGIN_EXPIRES_AFTER);

        let cors_allow_origins = std::env::var("CORS_ALLOW_ORIGINS")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            listen_addr,
            credential_root,
            realm,
            default_scopes,
            confirmation_window,
            cors_allow_origins,
        })
    }

    /// Settings handed to the authorization service.
    pub fn authorization(&self) -> AuthorizationConfig {
        AuthorizationConfig {
            realm: self.realm.clone(),
            endpoint: format!("http://{}", self.listen_addr),
            default_scopes: self.default_scopes.clone(),
            confirmation_window: self.confirmation_window,
        }
    }
}

fn parse_scopes(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthorizationService>,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::from_env())?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Realm: {}", config.realm);
    match &config.credential_root {
        Some(root) => info!("  Credential root: {}", root.display()),
        None => warn!("  Credential root: none, records are kept in memory only"),
    }

    let store = match &config.credential_root {
        Some(root) => {
            let (store, report) = CredentialStore::open(root);
            if !report.is_clean() {
                warn!(
                    skipped = report.errors.len(),
                    "some credential files could not be loaded"
                );
            }
            store
        }
        None => CredentialStore::in_memory(),
    };

    let service = Arc::new(
        AuthorizationService::new(Arc::new(store), Arc::new(LogNotifier))
            .with_config(config.authorization()),
    );

    let state = AppState { service };
    let app = build_router(state, config.cors_allow_origins.as_deref())?;

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Assemble the full application router.
pub fn build_router(state: AppState, cors_allow_origins: Option<&str>) -> anyhow::Result<Router> {
    let api = crate::api::router(Arc::clone(&state.service));

    let mut router = Router::new()
        .nest("/a/v1", api)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http());

    if let Some(origins) = cors_allow_origins {
        router = router.layer(cors_layer(origins)?);
    }

    Ok(router.with_state(state))
}

fn cors_layer(origins: &str) -> anyhow::Result<CorsLayer> {
    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]))
}
