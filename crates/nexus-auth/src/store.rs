//! Durable single-slot credential storage.
//!
//! [`FileCredentialStore`] keeps a JSON object on disk with file permissions
//! 0o600:
//!
//! ```json
//! { "access_token": "eyJhbGciOi..." }
//! ```
//!
//! Only the configured key is read or written; other keys in the file are
//! preserved.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::errors::AuthError;

/// A durable slot holding at most one credential.
pub trait CredentialStore: Send + Sync {
    /// Current credential, if any.
    fn load(&self) -> Option<Credential>;

    /// Replace the stored credential.
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;

    /// Remove the stored credential. Clearing an empty slot succeeds.
    fn clear(&self) -> Result<(), AuthError>;
}

/// Credential slot backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    key: String,
}

impl FileCredentialStore {
    /// Store the credential under `key` in the file at `path`.
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Option<Map<String, Value>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read credential file: {e}");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&data) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                warn!(path = %self.path.display(), "credential file is not a JSON object");
                None
            }
            Err(e) => {
                warn!(path = %self.path.display(), "failed to parse credential file: {e}");
                None
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.read_map()?
            .get(&self.key)
            .and_then(Value::as_str)
            .and_then(Credential::new)
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if credential.expose().is_empty() {
            return Err(AuthError::EmptyCredential);
        }
        let mut map = self.read_map().unwrap_or_default();
        let _ = map.insert(self.key.clone(), Value::from(credential.expose()));
        self.write_map(&map)?;
        debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        let Some(mut map) = self.read_map() else {
            return Ok(());
        };
        if map.remove(&self.key).is_none() {
            return Ok(());
        }
        if map.is_empty() {
            match std::fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AuthError::Io(e)),
            }
        } else {
            self.write_map(&map)?;
        }
        debug!(path = %self.path.display(), "credential cleared");
        Ok(())
    }
}

/// In-memory credential slot.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-filled with `token`.
    pub fn with_token(token: &str) -> Self {
        Self {
            slot: Mutex::new(Credential::new(token)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.slot.lock().clone()
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        *self.slot.lock() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_store(dir: &TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("credentials.json"), "access_token")
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(file_store(&dir).load().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.save(&Credential::new("tok").unwrap()).unwrap();
        assert_eq!(store.load().unwrap().expose(), "tok");
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("a/b/creds.json"), "access_token");
        store.save(&Credential::new("tok").unwrap()).unwrap();
        assert!(store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.save(&Credential::new("tok").unwrap()).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn clear_removes_file_when_last_key() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        store.save(&Credential::new("tok").unwrap()).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn clear_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        std::fs::write(
            store.path(),
            r#"{"access_token": "tok", "refresh_token": "ref"}"#,
        )
        .unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("refresh_token"));
    }

    #[test]
    fn clear_on_empty_slot_is_ok() {
        let dir = TempDir::new().unwrap();
        file_store(&dir).clear().unwrap();
    }

    #[test]
    fn corrupt_file_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn blank_stored_value_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir);
        std::fs::write(store.path(), r#"{"access_token": ""}"#).unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().is_none());
        store.save(&Credential::new("tok").unwrap()).unwrap();
        assert_eq!(store.load().unwrap().expose(), "tok");
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn memory_store_with_token() {
        assert_eq!(
            MemoryCredentialStore::with_token("abc").load().unwrap().expose(),
            "abc"
        );
        assert!(MemoryCredentialStore::with_token("").load().is_none());
    }
}
