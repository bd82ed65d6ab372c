//! Persistent key-value side channel that lets a session survive restarts.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use shared::protocol::User;
use tracing::{debug, warn};

use crate::error::StorageError;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Applies every change or none of them. `None` removes the key.
    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<(), StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write_batch(&[(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.write_batch(&[(key, None)])
    }
}

/// Returns whether anything actually changed.
fn apply_changes(entries: &mut BTreeMap<String, String>, changes: &[(&str, Option<&str>)]) -> bool {
    let mut changed = false;
    for (key, value) in changes {
        changed |= match value {
            Some(value) => {
                let previous = entries.insert(key.to_string(), value.to_string());
                previous.as_deref() != Some(*value)
            }
            None => entries.remove(*key).is_some(),
        };
    }
    changed
}

/// Credential and identity read back from the side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub user: User,
    pub token: String,
}

pub fn stored_token(storage: &dyn SessionStorage) -> Option<String> {
    storage.get(TOKEN_KEY).filter(|token| !token.is_empty())
}

/// Writes both keys in one batch; a failure leaves neither behind.
pub fn persist_session(
    storage: &dyn SessionStorage,
    user: &User,
    token: &str,
) -> Result<(), StorageError> {
    let user_json = serde_json::to_string(user)?;
    storage.write_batch(&[(TOKEN_KEY, Some(token)), (USER_KEY, Some(user_json.as_str()))])
}

pub fn clear_session(storage: &dyn SessionStorage) -> Result<(), StorageError> {
    storage.write_batch(&[(TOKEN_KEY, None), (USER_KEY, None)])
}

/// Returns the stored pair only when both halves are present and the identity
/// parses. A malformed identity is logged and treated as absent.
pub fn load_session(storage: &dyn SessionStorage) -> Option<PersistedSession> {
    let token = stored_token(storage)?;
    let raw_user = storage.get(USER_KEY)?;
    match serde_json::from_str::<User>(&raw_user) {
        Ok(user) => Some(PersistedSession { user, token }),
        Err(err) => {
            warn!("failed to parse stored user, ignoring persisted session: {err}");
            None
        }
    }
}

#[derive(Default)]
pub struct MemorySessionStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        apply_changes(&mut entries, changes);
        Ok(())
    }
}

/// JSON object on disk, loaded once and written through on every change.
pub struct FileSessionStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        debug!(path = %path.display(), keys = entries.len(), "opened session storage");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let encoded = serde_json::to_string_pretty(entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, encoded).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, String> {
    let Ok(raw) = fs::read_to_string(path) else {
        return BTreeMap::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(path = %path.display(), "session file is not valid json, starting empty: {err}");
        BTreeMap::new()
    })
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stages the changes on a copy; memory only moves once the file is written.
    fn write_batch(&self, changes: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut staged = entries.clone();
        if !apply_changes(&mut staged, changes) {
            return Ok(());
        }
        self.flush(&staged)?;
        *entries = staged;
        Ok(())
    }
}
