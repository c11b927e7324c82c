//! Out-of-band delivery of confirmation tokens

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, info};

use crate::domain::{token_hint, AuthorizationRecord};

/// Notification delivery failure
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NotifyError(pub String);

/// Delivers the confirmation token of a freshly registered record to its owner
/// (e.g. by email).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(&self, record: &AuthorizationRecord) -> Result<(), NotifyError>;
}

/// Writes the confirmation token to the service log.
///
/// The full token is only emitted at `debug` level; at `info` the log carries
/// the usual six-character hint. Development only: anybody who can read debug
/// logs can confirm the account.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_confirmation(&self, record: &AuthorizationRecord) -> Result<(), NotifyError> {
        let c = &record.credentials;
        info!(
            realm = %c.account_realm,
            account = %c.account_id,
            t = token_hint(&c.token),
            expires_at = c.expires_at,
            "confirmation token issued"
        );
        debug!(account = %c.account_id, token = %c.token, "confirmation token");
        Ok(())
    }
}
