//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;

use apikit::auth::{AuthorizationConfig, AuthorizationService, Notifier, NotifyError};
use apikit::domain::AuthorizationRecord;
use apikit::infra::CredentialStore;
use apikit::server::{build_router, AppState};

pub const TEST_REALM: &str = "test-realm";
pub const TEST_API_KEY: &str = "0123456789abcdef";

/// Notifier that keeps every confirmation it was asked to send.
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<AuthorizationRecord>>,
}

impl CapturingNotifier {
    /// Confirmation token of the most recent notification.
    pub fn last_token(&self) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|r| r.credentials.token.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send_confirmation(&self, record: &AuthorizationRecord) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub fn test_config() -> AuthorizationConfig {
    AuthorizationConfig {
        realm: TEST_REALM.to_string(),
        ..Default::default()
    }
}

/// Service over `store` with a capturing notifier.
pub fn test_service(store: CredentialStore) -> (Arc<AuthorizationService>, Arc<CapturingNotifier>) {
    let notifier = Arc::new(CapturingNotifier::default());
    let service = AuthorizationService::new(Arc::new(store), notifier.clone())
        .with_config(test_config());
    (Arc::new(service), notifier)
}

/// Service over a store rooted at `root`.
pub fn durable_service(root: &Path) -> (Arc<AuthorizationService>, Arc<CapturingNotifier>) {
    let (store, report) = CredentialStore::open(root);
    assert!(report.is_clean(), "unexpected reload errors: {:?}", report.errors);
    test_service(store)
}

/// Full application router over an in-memory store.
pub fn test_app() -> (Router, Arc<AuthorizationService>, Arc<CapturingNotifier>) {
    let (service, notifier) = test_service(CredentialStore::in_memory());
    let app = build_router(
        AppState {
            service: Arc::clone(&service),
        },
        None,
    )
    .unwrap();
    (app, service, notifier)
}

/// Register and confirm `account_id`, returning the bearer token.
pub async fn login(service: &AuthorizationService, account_id: &str) -> String {
    let registration = service.register(account_id, TEST_API_KEY).await.unwrap();
    service
        .confirm(
            &registration.token,
            &apikit::signature(TEST_API_KEY, &registration.token),
        )
        .unwrap()
}
