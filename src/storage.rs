//! Durable key/value storage for the persisted session snapshot.
//!
//! SYSTEM CONTEXT
//! ==============
//! The store writes the whole `Session` triple as one JSON value under one
//! key, and reads it back the same way. Persistence is advisory: failures are
//! logged and never block a state transition.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::types::{AuthError, Session};

/// Minimal string key/value store, shaped like browser `localStorage`.
pub trait SessionStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), AuthError>;
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::Storage("memory storage lock poisoned".to_owned())
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let entries = self.entries.lock().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// One JSON file per key inside a directory.
///
/// Writes go to a temp file first and are renamed into place, so a reader
/// never sees a half-written snapshot.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

fn io_error(e: std::io::Error) -> AuthError {
    AuthError::Storage(e.to_string())
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        std::fs::create_dir_all(&self.dir).map_err(io_error)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        write_private(&tmp, value).map_err(io_error)?;
        std::fs::rename(&tmp, &path).map_err(io_error)
    }

    fn remove(&self, key: &str) -> Result<(), AuthError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

/// Write `value` to a fresh file readable only by its owner; the snapshot
/// carries a bearer token.
fn write_private(path: &Path, value: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    // A leftover temp file keeps its old mode, so start from scratch.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let mut file = options.open(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

// =============================================================================
// SNAPSHOT HELPERS
// =============================================================================

/// Load the persisted session snapshot for `key`.
///
/// Unparseable or internally inconsistent snapshots are removed and treated
/// as absent.
pub fn load_session(storage: &dyn SessionStorage, key: &str) -> Option<Session> {
    let raw = match storage.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(error = %e, key, "session snapshot read failed");
            return None;
        }
    };
    match serde_json::from_str::<Session>(&raw) {
        Ok(session) if session.is_consistent() => Some(session),
        Ok(_) => {
            warn!(key, "discarding inconsistent session snapshot");
            clear_session(storage, key);
            None
        }
        Err(e) => {
            warn!(error = %e, key, "discarding unreadable session snapshot");
            clear_session(storage, key);
            None
        }
    }
}

/// Persist `session` under `key`. Signed-out sessions clear the key instead.
pub fn save_session(storage: &dyn SessionStorage, key: &str, session: &Session) {
    if !session.is_authenticated() {
        clear_session(storage, key);
        return;
    }
    let raw = match serde_json::to_string(session) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, key, "session snapshot encode failed");
            return;
        }
    };
    if let Err(e) = storage.set(key, &raw) {
        warn!(error = %e, key, "session snapshot write failed");
    }
}

/// Remove the persisted snapshot under `key`.
pub fn clear_session(storage: &dyn SessionStorage, key: &str) {
    if let Err(e) = storage.remove(key) {
        warn!(error = %e, key, "session snapshot removal failed");
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
