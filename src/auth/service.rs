//! Authorization service: register, confirm, revoke and per-request checks

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use tracing::{debug, error, info, warn};

use super::{
    bearer_token, generate_token, verify_signature, AuthError, Clock, Notifier, SystemClock,
};
use crate::domain::{
    scopes, token_hint, AuthState, AuthorizationRecord, Credential, INVALIDATED, NEVER_EXPIRES,
};
use crate::infra::{CredentialStore, StoreError};

/// How long a confirmation token stays usable.
pub const LOGIN_EXPIRES_AFTER: Duration = Duration::from_secs(15 * 60);

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Service-wide settings applied to new records.
#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    /// Realm assigned to every account registered through this service
    pub realm: String,
    /// Endpoint recorded on new records
    pub endpoint: String,
    /// Fallback scopes for new records
    pub default_scopes: BTreeSet<String>,
    /// Lifetime of confirmation tokens
    pub confirmation_window: Duration,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            realm: env!("CARGO_PKG_NAME").to_string(),
            endpoint: String::new(),
            default_scopes: [scopes::API_READ, scopes::API_WRITE]
                .into_iter()
                .map(String::from)
                .collect(),
            confirmation_window: LOGIN_EXPIRES_AFTER,
        }
    }
}

/// Answer to a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Short-lived confirmation token
    pub token: String,
    /// Unix time after which the token can no longer be confirmed
    pub expires_at: i64,
    pub confirmation_window: Duration,
}

/// Owns every state transition of authorization records.
pub struct AuthorizationService {
    store: Arc<CredentialStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: AuthorizationConfig,
}

impl AuthorizationService {
    pub fn new(store: Arc<CredentialStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
            config: AuthorizationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AuthorizationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }

    /// Start the registration of `account_id` in the service realm.
    ///
    /// Stores a pending record with a fresh confirmation token and hands it to the
    /// notifier. If the notification fails the call fails too, although the
    /// pending record has already been persisted; registering again replaces it.
    pub async fn register(&self, account_id: &str, api_key: &str) -> Result<Registration> {
        let realm = self.config.realm.as_str();
        if account_id.is_empty() || api_key.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "account id and api key are required".to_string(),
            ));
        }

        let window = self.config.confirmation_window;
        let expires_at = self.clock.now() + window.as_secs() as i64;

        let pending = AuthorizationRecord {
            endpoint: self.config.endpoint.clone(),
            default_scopes: self.config.default_scopes.clone(),
            credentials: Credential::new(realm, account_id, generate_token(), expires_at),
            state: AuthState::Init,
            api_key: api_key.to_string(),
            ..Default::default()
        };

        let record = self.store.register_with(realm, account_id, |current| {
            if current.is_some_and(|c| c.state == AuthState::Invalid) {
                warn!(realm, account = account_id, "register on invalidated record");
                return Err(AuthError::InvalidStateTransition {
                    from: AuthState::Invalid,
                    to: AuthState::Init,
                });
            }
            Ok(pending)
        })?;

        self.notifier
            .send_confirmation(&record)
            .await
            .map_err(|e| {
                error!(realm, account = account_id, error = %e, "confirmation not delivered");
                AuthError::Notification(e.to_string())
            })?;

        info!(realm, account = account_id, "registration pending confirmation");
        Ok(Registration {
            token: record.credentials.token,
            expires_at,
            confirmation_window: window,
        })
    }

    /// Exchange a confirmation token for a long-lived bearer token.
    ///
    /// Of two concurrent confirmations of the same token exactly one succeeds;
    /// the other fails with `AlreadyAuthorized` or `TokenNotFound`.
    pub fn confirm(&self, token: &str, signature: &str) -> Result<String> {
        let record = self.find(token)?;

        if !verify_signature(&record.api_key, record.token(), signature) {
            warn!(t = token_hint(token), "confirm with invalid signature");
            return Err(AuthError::InvalidSignature);
        }

        let now = self.clock.now();
        let c = &record.credentials;
        let authorized = self
            .store
            .register_with(&c.account_realm, &c.account_id, |current| {
                let current = match current {
                    Some(current) if current.token() == token => current,
                    _ => return Err(AuthError::TokenNotFound),
                };

                match current.state {
                    AuthState::Invalid => {
                        return Err(AuthError::InvalidStateTransition {
                            from: AuthState::Invalid,
                            to: AuthState::Authorized,
                        })
                    }
                    AuthState::Authorized => return Err(AuthError::AlreadyAuthorized),
                    AuthState::Init | AuthState::Undefined => {}
                }

                let c = &current.credentials;
                if c.expires_at < 0 || c.is_expired_at(now) {
                    return Err(AuthError::TokenExpired);
                }

                let mut next = current.clone();
                next.credentials.token = generate_token();
                next.credentials.expires_at = NEVER_EXPIRES;
                next.state = AuthState::Authorized;
                Ok(next)
            })?;

        info!(key = %authorized.primary_key(), "authorization confirmed");
        Ok(authorized.credentials.token)
    }

    /// Soft-revoke a bearer token.
    ///
    /// The record stays reachable by its token, expired one second in the past,
    /// so later lookups report "revoked" rather than "unknown".
    pub fn revoke(&self, bearer: &str, signature: &str) -> Result<()> {
        let now = self.clock.now();
        let revoked = self.store.update_existing_with(bearer, |current| {
            if !verify_signature(&current.api_key, current.token(), signature) {
                warn!(t = token_hint(bearer), "revoke with invalid signature");
                return Err(AuthError::InvalidSignature);
            }

            match current.state {
                AuthState::Invalid => {
                    return Err(AuthError::InvalidStateTransition {
                        from: AuthState::Invalid,
                        to: AuthState::Undefined,
                    })
                }
                AuthState::Undefined => return Err(AuthError::TokenExpired),
                AuthState::Init | AuthState::Authorized => {}
            }

            let mut next = current.clone();
            next.credentials.expires_at = now - 1;
            next.state = AuthState::Undefined;
            Ok(next)
        })?;

        info!(key = %revoked.primary_key(), "authorization revoked");
        Ok(())
    }

    /// Move a record into the terminal `Invalid` state.
    ///
    /// Nothing transitions out of `Invalid`; remediation happens outside the
    /// service (editing or removing the record file, then reloading).
    pub fn invalidate(&self, token: &str) -> Result<()> {
        let record = self.find(token)?;
        if record.state == AuthState::Invalid {
            return Ok(());
        }

        let invalidated = self
            .store
            .update_existing_with(token, |current| -> Result<AuthorizationRecord> {
                let mut next = current.clone();
                next.credentials.expires_at = INVALIDATED;
                next.state = AuthState::Invalid;
                Ok(next)
            })?;

        warn!(key = %invalidated.primary_key(), "authorization invalidated");
        Ok(())
    }

    /// Validate the bearer token in `headers` against `required_scope`.
    ///
    /// `required_scope` is a comma-separated list; every entry must be granted.
    pub fn check_authorization(
        &self,
        headers: &HeaderMap,
        required_scope: &str,
    ) -> Result<AuthorizationRecord> {
        let token = bearer_token(headers)?;
        self.authorize_token(token, required_scope)
    }

    /// Scope check for an already extracted bearer token.
    pub fn authorize_token(&self, token: &str, required_scope: &str) -> Result<AuthorizationRecord> {
        let record = match self.store.lookup_by_token(token) {
            Ok(Some(record)) => record,
            Ok(None) | Err(_) => return Err(AuthError::NotAuthorized),
        };

        if record.state != AuthState::Authorized
            || !record.credentials.is_valid_at(self.clock.now())
        {
            debug!(t = token_hint(token), state = %record.state, "rejected credential");
            return Err(AuthError::NotAuthorized);
        }

        let granted = record.effective_scopes();
        if granted.contains(scopes::API_ADMIN) {
            return Ok(record);
        }
        if required_scope.is_empty() {
            return Err(AuthError::NoScope);
        }
        if !has_scope(granted, required_scope) {
            debug!(t = token_hint(token), required = required_scope, "missing scope");
            return Err(AuthError::NotAuthorized);
        }

        Ok(record)
    }

    /// Look up a record by token without judging it.
    ///
    /// `Ok(None)` for unknown tokens; revoked records are still returned.
    pub fn lookup(&self, token: &str) -> Result<Option<AuthorizationRecord>> {
        Ok(self.store.lookup_by_token(token)?)
    }

    fn find(&self, token: &str) -> Result<AuthorizationRecord> {
        match self.store.lookup_by_token(token) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(AuthError::TokenNotFound),
            Err(StoreError::NoToken) => Err(AuthError::NoToken),
            Err(e) => Err(e.into()),
        }
    }
}

/// True if every comma-separated entry of `required` is in `granted`.
pub fn has_scope(granted: &BTreeSet<String>, required: &str) -> bool {
    required.split(',').all(|scope| granted.contains(scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{signature, ManualClock, MockNotifier, NotifyError};
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000;
    const API_KEY: &str = "app-key";

    struct Fixture {
        service: AuthorizationService,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let mut notifier = MockNotifier::new();
        notifier.expect_send_confirmation().returning(|_| Ok(()));
        fixture_with(notifier)
    }

    fn fixture_with(notifier: MockNotifier) -> Fixture {
        let clock = Arc::new(ManualClock::new(NOW));
        let service = service_with(
            Arc::new(CredentialStore::in_memory()),
            notifier,
            clock.clone(),
        );
        Fixture { service, clock }
    }

    fn service_with(
        store: Arc<CredentialStore>,
        notifier: MockNotifier,
        clock: Arc<dyn Clock>,
    ) -> AuthorizationService {
        AuthorizationService::new(store, Arc::new(notifier))
            .with_config(AuthorizationConfig {
                realm: "realm".to_string(),
                ..Default::default()
            })
            .with_clock(clock)
    }

    /// Second service over the same store.
    fn sibling(service: &AuthorizationService, clock: Arc<dyn Clock>) -> AuthorizationService {
        let mut notifier = MockNotifier::new();
        notifier.expect_send_confirmation().returning(|_| Ok(()));
        service_with(Arc::clone(service.store()), notifier, clock)
    }

    /// Runs `action` the first time the time is read, i.e. after the caller has
    /// looked its record up but before it writes.
    struct InterleavingClock {
        now: i64,
        action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl InterleavingClock {
        fn new(now: i64, action: impl FnOnce() + Send + 'static) -> Arc<Self> {
            Arc::new(Self {
                now,
                action: Mutex::new(Some(Box::new(action))),
            })
        }
    }

    impl Clock for InterleavingClock {
        fn now(&self) -> i64 {
            let action = self.action.lock().unwrap().take();
            if let Some(action) = action {
                action();
            }
            self.now
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        h
    }

    async fn login(service: &AuthorizationService, account: &str) -> String {
        let reg = service.register(account, API_KEY).await.unwrap();
        service
            .confirm(&reg.token, &signature(API_KEY, &reg.token))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_creates_pending_record() {
        let f = fixture();
        let reg = f.service.register("alice", API_KEY).await.unwrap();

        assert_eq!(reg.expires_at, NOW + 900);
        assert_eq!(reg.confirmation_window, LOGIN_EXPIRES_AFTER);

        let record = f.service.lookup(&reg.token).unwrap().unwrap();
        assert_eq!(record.state, AuthState::Init);
        assert_eq!(record.credentials.account_realm, "realm");
        assert_eq!(record.api_key, API_KEY);
        assert!(record.effective_scopes().contains(scopes::API_READ));
    }

    #[tokio::test]
    async fn test_register_requires_identity_and_key() {
        let f = fixture();
        assert!(matches!(
            f.service.register("", API_KEY).await,
            Err(AuthError::InvalidCredentials(_))
        ));
        assert!(matches!(
            f.service.register("alice", "").await,
            Err(AuthError::InvalidCredentials(_))
        ));
    }

    #[tokio::test]
    async fn test_register_then_confirm() {
        let f = fixture();
        let reg = f.service.register("alice", API_KEY).await.unwrap();
        let bearer_token = f
            .service
            .confirm(&reg.token, &signature(API_KEY, &reg.token))
            .unwrap();

        assert_ne!(bearer_token, reg.token);
        let record = f.service.lookup(&bearer_token).unwrap().unwrap();
        assert_eq!(record.state, AuthState::Authorized);
        assert_eq!(record.credentials.expires_at, NEVER_EXPIRES);

        // confirmation token is gone
        assert!(f.service.lookup(&reg.token).unwrap().is_none());
        assert!(matches!(
            f.service
                .confirm(&reg.token, &signature(API_KEY, &reg.token)),
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_confirm_wrong_signature() {
        let f = fixture();
        let reg = f.service.register("alice", API_KEY).await.unwrap();

        let result = f.service.confirm(&reg.token, &signature("guess", &reg.token));
        assert!(matches!(result, Err(AuthError::InvalidSignature)));

        // signature is checked before expiry
        f.clock.advance(3600);
        let result = f.service.confirm(&reg.token, "deadbeef");
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_confirm_after_window() {
        let f = fixture();
        let reg = f.service.register("alice", API_KEY).await.unwrap();

        f.clock.advance(901);
        let result = f.service.confirm(&reg.token, &signature(API_KEY, &reg.token));
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_confirm_at_window_edge() {
        let f = fixture();
        let reg = f.service.register("alice", API_KEY).await.unwrap();

        f.clock.advance(900);
        assert!(f
            .service
            .confirm(&reg.token, &signature(API_KEY, &reg.token))
            .is_ok());
    }

    #[test]
    fn test_confirm_unknown_and_empty_token() {
        let f = fixture();
        assert!(matches!(
            f.service.confirm("unknown", "sig"),
            Err(AuthError::TokenNotFound)
        ));
        assert!(matches!(
            f.service.confirm("", "sig"),
            Err(AuthError::NoToken)
        ));
    }

    #[tokio::test]
    async fn test_confirm_bearer_token_is_already_authorized() {
        let f = fixture();
        let token = login(&f.service, "alice").await;

        let result = f.service.confirm(&token, &signature(API_KEY, &token));
        assert!(matches!(result, Err(AuthError::AlreadyAuthorized)));
    }

    #[tokio::test]
    async fn test_register_while_authorized() {
        let f = fixture();
        login(&f.service, "alice").await;

        let result = f.service.register("alice", API_KEY).await;
        assert!(matches!(result, Err(AuthError::AlreadyAuthorized)));
    }

    #[tokio::test]
    async fn test_reregister_pending_and_revoked() {
        let f = fixture();
        let first = f.service.register("alice", API_KEY).await.unwrap();
        let second = f.service.register("alice", API_KEY).await.unwrap();
        assert_ne!(first.token, second.token);
        assert!(f.service.lookup(&first.token).unwrap().is_none());

        let token = f
            .service
            .confirm(&second.token, &signature(API_KEY, &second.token))
            .unwrap();
        f.service.revoke(&token, &signature(API_KEY, &token)).unwrap();

        assert!(f.service.register("alice", API_KEY).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke() {
        let f = fixture();
        let token = login(&f.service, "alice").await;
        assert!(f
            .service
            .check_authorization(&bearer(&token), scopes::API_READ)
            .is_ok());

        f.service.revoke(&token, &signature(API_KEY, &token)).unwrap();

        assert!(matches!(
            f.service
                .check_authorization(&bearer(&token), scopes::API_READ),
            Err(AuthError::NotAuthorized)
        ));

        // still known, but expired
        let record = f.service.lookup(&token).unwrap().unwrap();
        assert_eq!(record.state, AuthState::Undefined);
        assert_eq!(record.credentials.expires_at, NOW - 1);
        assert!(f.service.lookup("never-issued").unwrap().is_none());

        assert!(matches!(
            f.service.revoke(&token, &signature(API_KEY, &token)),
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_revoke_wrong_signature() {
        let f = fixture();
        let token = login(&f.service, "alice").await;

        let result = f.service.revoke(&token, &signature("guess", &token));
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
        assert!(f
            .service
            .check_authorization(&bearer(&token), scopes::API_READ)
            .is_ok());
    }

    #[tokio::test]
    async fn test_invalid_is_a_sink() {
        let f = fixture();
        let token = login(&f.service, "alice").await;
        f.service.invalidate(&token).unwrap();
        // idempotent
        f.service.invalidate(&token).unwrap();

        let record = f.service.lookup(&token).unwrap().unwrap();
        assert_eq!(record.state, AuthState::Invalid);
        assert_eq!(record.credentials.expires_at, INVALIDATED);

        assert!(matches!(
            f.service.check_authorization(&bearer(&token), scopes::API_READ),
            Err(AuthError::NotAuthorized)
        ));
        assert!(matches!(
            f.service.revoke(&token, &signature(API_KEY, &token)),
            Err(AuthError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            f.service.confirm(&token, &signature(API_KEY, &token)),
            Err(AuthError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            f.service.register("alice", API_KEY).await,
            Err(AuthError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalidate_lands_before_revoke_writes() {
        let f = fixture();
        let token = login(&f.service, "alice").await;

        let admin = sibling(&f.service, f.clock.clone());
        let target = token.clone();
        let clock = InterleavingClock::new(NOW, move || admin.invalidate(&target).unwrap());
        let racing = sibling(&f.service, clock);

        let result = racing.revoke(&token, &signature(API_KEY, &token));
        assert!(matches!(
            result,
            Err(AuthError::InvalidStateTransition {
                from: AuthState::Invalid,
                to: AuthState::Undefined
            })
        ));

        let record = f.service.lookup(&token).unwrap().unwrap();
        assert_eq!(record.state, AuthState::Invalid);
        assert_eq!(record.credentials.expires_at, INVALIDATED);
    }

    #[tokio::test]
    async fn test_invalidate_lands_before_register_writes() {
        let f = fixture();
        let token = login(&f.service, "alice").await;
        f.service.revoke(&token, &signature(API_KEY, &token)).unwrap();

        let admin = sibling(&f.service, f.clock.clone());
        let target = token.clone();
        let clock = InterleavingClock::new(NOW, move || admin.invalidate(&target).unwrap());
        let racing = sibling(&f.service, clock);

        let result = racing.register("alice", API_KEY).await;
        assert!(matches!(
            result,
            Err(AuthError::InvalidStateTransition {
                from: AuthState::Invalid,
                to: AuthState::Init
            })
        ));

        let record = f.service.store().lookup_by_key("realm", "alice").unwrap();
        assert_eq!(record.state, AuthState::Invalid);
        assert_eq!(record.token(), token);
    }

    #[tokio::test]
    async fn test_confirm_lands_before_second_confirm_writes() {
        let f = fixture();
        let reg = f.service.register("alice", API_KEY).await.unwrap();
        let sig = signature(API_KEY, &reg.token);

        let winner = Arc::new(Mutex::new(None));
        let other = sibling(&f.service, f.clock.clone());
        let (token, s, slot) = (reg.token.clone(), sig.clone(), Arc::clone(&winner));
        let clock = InterleavingClock::new(NOW, move || {
            *slot.lock().unwrap() = Some(other.confirm(&token, &s).unwrap());
        });
        let racing = sibling(&f.service, clock);

        let result = racing.confirm(&reg.token, &sig);
        assert!(matches!(result, Err(AuthError::AlreadyAuthorized)));

        let bearer_token = winner.lock().unwrap().clone().unwrap();
        let record = f.service.lookup(&bearer_token).unwrap().unwrap();
        assert_eq!(record.state, AuthState::Authorized);
        assert!(f.service.lookup(&reg.token).unwrap().is_none());
        assert_eq!(f.service.store().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_confirms_have_one_winner() {
        let Fixture { service, .. } = fixture();
        let reg = service.register("alice", API_KEY).await.unwrap();
        let sig = signature(API_KEY, &reg.token);
        let service = Arc::new(service);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let (token, sig) = (reg.token.clone(), sig.clone());
                std::thread::spawn(move || service.confirm(&token, &sig))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<&String> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        for result in &results {
            if let Err(e) = result {
                assert!(
                    matches!(e, AuthError::AlreadyAuthorized | AuthError::TokenNotFound),
                    "unexpected error: {e}"
                );
            }
        }

        let record = service.lookup(winners[0]).unwrap().unwrap();
        assert_eq!(record.state, AuthState::Authorized);
        assert_eq!(service.store().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_invalidate_and_revoke_end_invalid() {
        for _ in 0..20 {
            let Fixture { service, .. } = fixture();
            let token = login(&service, "alice").await;
            let service = Arc::new(service);

            let revoker = {
                let (service, token) = (Arc::clone(&service), token.clone());
                std::thread::spawn(move || service.revoke(&token, &signature(API_KEY, &token)))
            };
            let invalidator = {
                let (service, token) = (Arc::clone(&service), token.clone());
                std::thread::spawn(move || service.invalidate(&token))
            };

            let revoked = revoker.join().unwrap();
            invalidator.join().unwrap().unwrap();

            if let Err(e) = revoked {
                assert!(matches!(e, AuthError::InvalidStateTransition { .. }));
            }
            let record = service.lookup(&token).unwrap().unwrap();
            assert_eq!(record.state, AuthState::Invalid);
            assert_eq!(record.credentials.expires_at, INVALIDATED);
        }
    }

    #[tokio::test]
    async fn test_concurrent_invalidate_and_register_never_resurrect() {
        for _ in 0..20 {
            let Fixture { service, .. } = fixture();
            let token = login(&service, "alice").await;
            service.revoke(&token, &signature(API_KEY, &token)).unwrap();
            let service = Arc::new(service);

            let invalidator = {
                let (service, token) = (Arc::clone(&service), token.clone());
                std::thread::spawn(move || service.invalidate(&token))
            };
            let registered = service.register("alice", API_KEY).await;
            let invalidated = invalidator.join().unwrap();

            let record = service.store().lookup_by_key("realm", "alice").unwrap();
            match (invalidated, registered) {
                // invalidated first: the record stays invalid
                (Ok(()), Err(AuthError::InvalidStateTransition { .. })) => {
                    assert_eq!(record.state, AuthState::Invalid);
                    assert_eq!(record.token(), token);
                }
                // registered first: the old token was rotated away
                (Err(AuthError::TokenNotFound), Ok(reg)) => {
                    assert_eq!(record.state, AuthState::Init);
                    assert_eq!(record.token(), reg.token);
                }
                (invalidated, registered) => {
                    panic!("unexpected outcome: {invalidated:?} / {registered:?}")
                }
            }
        }
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_record() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send_confirmation()
            .times(1)
            .returning(|_| Err(NotifyError("smtp down".to_string())));
        let f = fixture_with(notifier);

        let result = f.service.register("alice", API_KEY).await;
        assert!(matches!(result, Err(AuthError::Notification(_))));

        let record = f.service.store().lookup_by_key("realm", "alice").unwrap();
        assert_eq!(record.state, AuthState::Init);
    }

    #[tokio::test]
    async fn test_notifier_receives_pending_record() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send_confirmation()
            .withf(|r| r.state == AuthState::Init && r.credentials.account_id == "alice")
            .times(1)
            .returning(|_| Ok(()));
        let f = fixture_with(notifier);

        f.service.register("alice", API_KEY).await.unwrap();
    }

    #[tokio::test]
    async fn test_pending_token_is_not_a_bearer() {
        let f = fixture();
        let reg = f.service.register("alice", API_KEY).await.unwrap();

        assert!(matches!(
            f.service
                .check_authorization(&bearer(&reg.token), scopes::API_READ),
            Err(AuthError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_check_authorization_scopes() {
        let f = fixture();
        let token = login(&f.service, "alice").await;

        let mut record = f.service.lookup(&token).unwrap().unwrap();
        record.scopes = ["a", "b", "c"].into_iter().map(String::from).collect();
        f.service.store().update_existing(record.clone()).unwrap();

        assert!(f.service.check_authorization(&bearer(&token), "a,b").is_ok());
        assert!(f.service.check_authorization(&bearer(&token), "b,a").is_ok());
        assert!(matches!(
            f.service.check_authorization(&bearer(&token), "a,d"),
            Err(AuthError::NotAuthorized)
        ));
        assert!(matches!(
            f.service.check_authorization(&bearer(&token), ""),
            Err(AuthError::NoScope)
        ));

        record.scopes = ["a", "c"].into_iter().map(String::from).collect();
        f.service.store().update_existing(record).unwrap();
        assert!(matches!(
            f.service.check_authorization(&bearer(&token), "a,b"),
            Err(AuthError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn test_admin_scope_short_circuits() {
        let f = fixture();
        let token = login(&f.service, "root").await;

        let mut record = f.service.lookup(&token).unwrap().unwrap();
        record.scopes = [scopes::API_ADMIN.to_string()].into();
        f.service.store().update_existing(record).unwrap();

        for required in ["api:delete", "billing:write,reports:read", ""] {
            assert!(f
                .service
                .check_authorization(&bearer(&token), required)
                .is_ok());
        }
    }

    #[test]
    fn test_check_authorization_without_bearer() {
        let f = fixture();
        assert!(matches!(
            f.service
                .check_authorization(&HeaderMap::new(), scopes::API_READ),
            Err(AuthError::NoToken)
        ));
        assert!(matches!(
            f.service
                .check_authorization(&bearer("unknown"), scopes::API_READ),
            Err(AuthError::NotAuthorized)
        ));
    }

    #[test]
    fn test_has_scope() {
        let granted: BTreeSet<String> = ["production:write", "production:read", "resource:read"]
            .into_iter()
            .map(String::from)
            .collect();

        assert!(has_scope(&granted, "production:read"));
        assert!(!has_scope(&granted, "resource:write"));
        assert!(has_scope(&granted, "production:read,production:write"));
        assert!(!has_scope(&granted, "production:read,resource:write"));
        assert!(!has_scope(&granted, "production:read,"));
    }
}
