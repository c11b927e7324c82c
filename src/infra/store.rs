//! Credential store
//!
//! Thread-safe index over [`AuthorizationRecord`]s, looked up by bearer token or by
//! primary key, backed by one file per record under a root directory.
//!
//! # Concurrency
//!
//! Every mutation (`reload`, `register_with`, `update_existing_with`) holds
//! `write_lock` for its full duration, file write included, so writes to the same
//! path never interleave. State checks run inside that section against the record
//! as currently stored, never against an earlier copy. The durable write happens first; the index update follows in a
//! single `RwLock` write section, which makes the token rotation (drop old token,
//! insert new one) invisible to concurrent readers. Lookups only take the read
//! lock and never touch the file system.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use super::files::{read_record, record_path, walk_record_files, write_record_atomic};
use super::{Result, StoreError};
use crate::domain::{primary_key, token_hint, AuthState, AuthorizationRecord};

/// Outcome of a cold-start reload.
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// Number of records indexed
    pub loaded: usize,
    /// Files or directories that could not be loaded
    pub errors: Vec<(PathBuf, StoreError)>,
}

impl ReloadReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Default)]
struct Indexes {
    root: Option<PathBuf>,
    by_token: HashMap<String, Arc<AuthorizationRecord>>,
    by_key: HashMap<String, Arc<AuthorizationRecord>>,
}

impl Indexes {
    fn check_token(&self, record: &AuthorizationRecord) -> Result<()> {
        match self.by_token.get(record.token()) {
            Some(owner) if owner.primary_key() != record.primary_key() => {
                Err(StoreError::DuplicateToken(owner.primary_key()))
            }
            _ => Ok(()),
        }
    }

    fn insert(&mut self, record: AuthorizationRecord) {
        let key = record.primary_key();
        if let Some(prior) = self.by_key.get(&key) {
            if prior.token() != record.token() {
                self.by_token.remove(prior.token());
            }
        }
        let record = Arc::new(record);
        self.by_token
            .insert(record.token().to_string(), Arc::clone(&record));
        self.by_key.insert(key, record);
    }
}

/// File-backed index of authorization records.
pub struct CredentialStore {
    write_lock: Mutex<()>,
    indexes: RwLock<Indexes>,
}

impl CredentialStore {
    /// Pure in-memory store, nothing is persisted.
    pub fn in_memory() -> Self {
        Self {
            write_lock: Mutex::new(()),
            indexes: RwLock::new(Indexes::default()),
        }
    }

    /// Create a store rooted at `root` and load every record found there.
    pub fn open(root: impl AsRef<Path>) -> (Self, ReloadReport) {
        let store = Self::in_memory();
        let report = store.reload(root);
        (store, report)
    }

    /// Root directory, `None` when running in memory.
    pub fn root(&self) -> Option<PathBuf> {
        self.read().root.clone()
    }

    /// Clear both indexes and rebuild them from the files under `root`.
    ///
    /// An empty `root` yields an empty in-memory store. Files that fail to load are
    /// logged and reported but never abort the scan.
    pub fn reload(&self, root: impl AsRef<Path>) -> ReloadReport {
        let _guard = self.lock_writes();
        let root = root.as_ref();

        let mut fresh = Indexes::default();
        let mut report = ReloadReport::default();

        if root.as_os_str().is_empty() {
            debug!("flushing credential store, in-memory mode");
        } else {
            debug!(root = %root.display(), "flushing credential store");
            fresh.root = Some(root.to_path_buf());

            let (files, walk_errors) = walk_record_files(root);
            report.errors.extend(walk_errors);

            for path in files {
                let loaded = read_record(&path)
                    .and_then(|record| validate(&record).map(|_| record))
                    .and_then(|record| fresh.check_token(&record).map(|_| record));
                match loaded {
                    Ok(record) => fresh.insert(record),
                    Err(e) => report.errors.push((path, e)),
                }
            }
        }

        for (path, e) in &report.errors {
            warn!(path = %path.display(), error = %e, "skipping unreadable credential file");
        }

        report.loaded = fresh.by_key.len();
        *self.write() = fresh;

        info!(
            loaded = report.loaded,
            skipped = report.errors.len(),
            "credential store loaded"
        );
        report
    }

    /// Insert or overwrite the record under its primary key.
    ///
    /// Fails with [`StoreError::AlreadyAuthorized`] if the record currently stored
    /// under the same primary key is [`AuthState::Authorized`], and with
    /// [`StoreError::Invalidated`] if it is [`AuthState::Invalid`]. A prior token
    /// for the same primary key is dropped from the token index.
    pub fn register(&self, record: AuthorizationRecord) -> Result<()> {
        validate(&record)?;
        let realm = record.credentials.account_realm.clone();
        let id = record.credentials.account_id.clone();
        self.register_with(&realm, &id, |_| Ok(record)).map(|_| ())
    }

    /// Compute and store the next record for a primary key.
    ///
    /// `next` receives the record currently stored under the key and runs under
    /// the write lock, so nothing can change that record between the decision and
    /// the write. `next` must not call back into the store. Authorized records are
    /// never replaced; invalidated records only by another invalidated record.
    pub fn register_with<E, F>(
        &self,
        account_realm: &str,
        account_id: &str,
        next: F,
    ) -> std::result::Result<AuthorizationRecord, E>
    where
        E: From<StoreError>,
        F: FnOnce(Option<&AuthorizationRecord>) -> std::result::Result<AuthorizationRecord, E>,
    {
        let key = primary_key(account_realm, account_id);
        let _guard = self.lock_writes();
        let current = self.read().by_key.get(&key).cloned();

        if let Some(existing) = current.as_deref() {
            if existing.state == AuthState::Authorized {
                error!(
                    key = %key,
                    t = token_hint(existing.token()),
                    state = %existing.state,
                    "already authorized"
                );
                return Err(StoreError::AlreadyAuthorized(key).into());
            }
        }

        let record = next(current.as_deref())?;
        if record.primary_key() != key {
            return Err(StoreError::InvalidRecord("primary key changed".to_string()).into());
        }
        if let Some(existing) = current.as_deref() {
            keep_invalid(existing, &record)?;
        }

        debug!(key = %key, t = token_hint(record.token()), "register");
        Ok(self.commit(record)?)
    }

    /// Overwrite a record that is already registered under its current token.
    ///
    /// Used for state transitions on existing records; never creates new ones.
    pub fn update_existing(&self, record: AuthorizationRecord) -> Result<()> {
        let token = record.token().to_string();
        self.update_existing_with(&token, |current| {
            if current.primary_key() == record.primary_key() {
                Ok(record)
            } else {
                Err(StoreError::NotFound)
            }
        })
        .map(|_| ())
    }

    /// Compute and store the next version of the record registered under `token`.
    ///
    /// Same locking contract as [`register_with`](Self::register_with): `next` sees
    /// the record as it is at write time. The result must keep the primary key.
    pub fn update_existing_with<E, F>(
        &self,
        token: &str,
        next: F,
    ) -> std::result::Result<AuthorizationRecord, E>
    where
        E: From<StoreError>,
        F: FnOnce(&AuthorizationRecord) -> std::result::Result<AuthorizationRecord, E>,
    {
        if token.is_empty() {
            return Err(StoreError::NoToken.into());
        }
        let _guard = self.lock_writes();

        debug!(t = token_hint(token), "update");

        let current = self
            .read()
            .by_token
            .get(token)
            .cloned()
            .ok_or(StoreError::NotFound)?;

        let record = next(current.as_ref())?;
        if record.primary_key() != current.primary_key() {
            return Err(StoreError::NotFound.into());
        }
        keep_invalid(&current, &record)?;

        Ok(self.commit(record)?)
    }

    /// Look up a record by bearer token.
    ///
    /// `Ok(None)` means the token is unknown.
    pub fn lookup_by_token(&self, token: &str) -> Result<Option<AuthorizationRecord>> {
        debug!(t = token_hint(token), "lookup");

        if token.is_empty() {
            return Err(StoreError::NoToken);
        }
        Ok(self
            .read()
            .by_token
            .get(token)
            .map(|r| AuthorizationRecord::clone(r)))
    }

    /// Look up a record by its (realm, account id) primary key.
    pub fn lookup_by_key(&self, account_realm: &str, account_id: &str) -> Option<AuthorizationRecord> {
        self.read()
            .by_key
            .get(&primary_key(account_realm, account_id))
            .map(|r| AuthorizationRecord::clone(r))
    }

    /// Snapshot of all records, ordered by primary key.
    pub fn records(&self) -> Vec<AuthorizationRecord> {
        let indexes = self.read();
        let mut records: Vec<_> = indexes
            .by_key
            .values()
            .map(|r| AuthorizationRecord::clone(r))
            .collect();
        records.sort_by_key(|r| r.primary_key());
        records
    }

    pub fn len(&self) -> usize {
        self.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Durable write, then index update. Caller holds `write_lock`.
    fn commit(&self, record: AuthorizationRecord) -> Result<AuthorizationRecord> {
        validate(&record)?;
        self.read().check_token(&record)?;
        self.persist(&record)?;
        self.write().insert(record.clone());
        Ok(record)
    }

    fn persist(&self, record: &AuthorizationRecord) -> Result<()> {
        let Some(root) = self.root() else {
            return Ok(());
        };
        let path = record_path(&root, record);
        write_record_atomic(&path, record).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to persist credential");
            e
        })
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, Indexes> {
        self.indexes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Indexes> {
        self.indexes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// `Invalid` is terminal.
fn keep_invalid(current: &AuthorizationRecord, next: &AuthorizationRecord) -> Result<()> {
    if current.state == AuthState::Invalid && next.state != AuthState::Invalid {
        warn!(key = %current.primary_key(), attempted = %next.state, "write over invalidated record");
        return Err(StoreError::Invalidated {
            key: current.primary_key(),
            attempted: next.state,
        });
    }
    Ok(())
}

fn validate(record: &AuthorizationRecord) -> Result<()> {
    let c = &record.credentials;
    if c.token.is_empty() {
        return Err(StoreError::InvalidRecord("missing token".to_string()));
    }
    if c.account_realm.is_empty() || c.account_id.is_empty() {
        return Err(StoreError::InvalidRecord("missing account identity".to_string()));
    }
    Ok(())
}
