//! One-file-per-record persistence helpers
//!
//! Records are stored as pretty-printed JSON under the store root, in a file
//! named by the hex SHA-256 of the record's primary key.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use super::{Result, StoreError};
use crate::domain::AuthorizationRecord;

/// Name prefix of in-flight writes (the `tempfile` default).
pub const TEMP_PREFIX: &str = ".tmp";

/// File name for a primary key.
pub fn record_file_name(primary_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(primary_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Full path of a record under `root`.
pub fn record_path(root: &Path, record: &AuthorizationRecord) -> PathBuf {
    root.join(record_file_name(&record.primary_key()))
}

/// Read and decode one record file.
pub fn read_record(path: &Path) -> Result<AuthorizationRecord> {
    let data = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| StoreError::serialization(path, e))
}

/// Write a record so that readers never observe a partial file.
///
/// The payload goes to a temp file in the destination directory, is synced, and
/// is then persisted over the destination. A failed write drops the temp file.
pub fn write_record_atomic(path: &Path, record: &AuthorizationRecord) -> Result<()> {
    let payload =
        serde_json::to_vec_pretty(record).map_err(|e| StoreError::serialization(path, e))?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    temp.write_all(&payload)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| StoreError::io(temp.path(), e))?;

    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// Recursively list record files under `root`.
///
/// Unreadable entries are reported alongside the files that were found instead
/// of aborting the walk. A missing root is an empty store. Temp files from
/// interrupted writes are skipped.
pub fn walk_record_files(root: &Path) -> (Vec<PathBuf>, Vec<(PathBuf, StoreError)>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_dir() || is_temp_file(entry.path()) => {}
            Ok(entry) => files.push(entry.into_path()),
            Err(e) if e.depth() == 0 && is_not_found(&e) => {}
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                errors.push((path.clone(), StoreError::io(path, io::Error::from(e))));
            }
        }
    }

    files.sort();
    (files, errors)
}

fn is_not_found(e: &walkdir::Error) -> bool {
    e.io_error()
        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(TEMP_PREFIX))
}
