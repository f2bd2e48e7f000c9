//! Persistent credential storage.
//!
//! [`Storage`] is a small string key/value abstraction standing in for the
//! browser's local storage: [`MemoryStorage`] keeps values for the life of the
//! process, [`FileStorage`] keeps them in a JSON file. [`CredentialStore`]
//! sits on top and owns the four session keys.
//!
//! # File Format
//!
//! ```json
//! {
//!   "currentUser": "{\"companyId\":\"9\",\"companyName\":\"Acme\"}",
//!   "userRole": "COMPANY",
//!   "token": "eyJhbGciOiJIUzI1NiJ9...",
//!   "corsToken": "4f1c..."
//! }
//! ```

use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::auth::{Identity, Principal, Role};
use crate::error::{Error, Result};

/// String key/value storage backend.
///
/// Multi-key writes must land all-or-nothing from the caller's point of view.
pub trait Storage: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write several keys in one operation
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove several keys in one operation; absent keys are ignored
    fn remove_many(&self, keys: &[&str]) -> Result<()>;

    /// Write a single key
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    /// Remove a single key
    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }
}

/// In-memory storage for tests and short-lived tools.
///
/// Does NOT persist across restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| Error::storage(format!("memory storage poisoned: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| Error::storage(format!("memory storage poisoned: {}", e)))?;
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| Error::storage(format!("memory storage poisoned: {}", e)))?;
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

/// JSON-file storage.
///
/// Keeps an in-memory cache and rewrites the whole file on every change via a
/// temporary file and rename.
#[derive(Debug)]
pub struct FileStorage {
    file_path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `file_path`
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        let cache = Self::read_file(&file_path)?;
        Ok(Self {
            file_path,
            cache: RwLock::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn read_file(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::storage(format!("cannot read {}: {}", path.display(), e)))?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_file(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::storage(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(values)?;
        let tmp_path = self.file_path.with_extension("tmp");
        fs::write(&tmp_path, contents)
            .map_err(|e| Error::storage(format!("cannot write {}: {}", tmp_path.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                Error::storage(format!("cannot restrict {}: {}", tmp_path.display(), e))
            })?;
        }

        fs::rename(&tmp_path, &self.file_path).map_err(|e| {
            Error::storage(format!("cannot replace {}: {}", self.file_path.display(), e))
        })?;
        Ok(())
    }

    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let mut cache = self
            .cache
            .write()
            .map_err(|e| Error::storage(format!("file storage poisoned: {}", e)))?;
        let mut next = cache.clone();
        change(&mut next);
        self.write_file(&next)?;
        *cache = next;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let cache = self
            .cache
            .read()
            .map_err(|e| Error::storage(format!("file storage poisoned: {}", e)))?;
        Ok(cache.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.update(|values| {
            for (key, value) in entries {
                values.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.update(|values| {
            for key in keys {
                values.remove(*key);
            }
        })
    }
}

/// One of the four persisted session slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    /// Serialized identity
    CurrentUser,
    /// Role string
    UserRole,
    /// Bearer session token
    Token,
    /// Anti-forgery token
    CorsToken,
}

impl CredentialField {
    pub const ALL: [CredentialField; 4] = [
        CredentialField::CurrentUser,
        CredentialField::UserRole,
        CredentialField::Token,
        CredentialField::CorsToken,
    ];

    /// Storage key
    pub fn key(&self) -> &'static str {
        match self {
            CredentialField::CurrentUser => "currentUser",
            CredentialField::UserRole => "userRole",
            CredentialField::Token => "token",
            CredentialField::CorsToken => "corsToken",
        }
    }
}

/// Raw contents of the credential slots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredCredentials {
    pub identity: Option<serde_json::Value>,
    pub role: Option<String>,
    pub token: Option<String>,
    /// Empty when never issued
    pub anti_forgery_token: String,
}

impl StoredCredentials {
    /// True when every slot is empty
    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.role.is_none()
            && self.token.is_none()
            && self.anti_forgery_token.is_empty()
    }

    /// Rebuild the principal from the identity and role slots.
    ///
    /// `Ok(None)` when either slot is empty; an error when they disagree.
    pub fn principal(&self) -> Result<Option<Principal>> {
        let (identity, role) = match (&self.identity, &self.role) {
            (Some(identity), Some(role)) => (identity, role),
            _ => return Ok(None),
        };
        let role: Role = role.parse()?;
        let identity = Identity::from_value(role, identity.clone())?;
        Principal::new(role, identity).map(Some)
    }
}

/// The four session slots on top of a [`Storage`] backend.
///
/// Without a backend (non-interactive execution) every read is empty and
/// every write is a no-op. Backend failures are logged and absorbed.
#[derive(Clone, Default)]
pub struct CredentialStore {
    backend: Option<Arc<dyn Storage>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("available", &self.is_available())
            .finish()
    }
}

impl CredentialStore {
    /// Credential store over the given backend
    pub fn new(backend: Arc<dyn Storage>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Credential store for a context without persistent storage
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Credential store backed by a fresh [`MemoryStorage`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Read one slot
    pub fn get(&self, field: CredentialField) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get(field.key()) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {}: {}", field.key(), e);
                None
            }
        }
    }

    /// Read every slot; absent or unreadable values come back empty
    pub fn load(&self) -> StoredCredentials {
        let identity = self.get(CredentialField::CurrentUser).and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| {
                    warn!("Discarding unreadable {}: {}", CredentialField::CurrentUser.key(), e)
                })
                .ok()
        });

        StoredCredentials {
            identity,
            role: self.get(CredentialField::UserRole),
            token: self.get(CredentialField::Token),
            anti_forgery_token: self.anti_forgery_token(),
        }
    }

    /// Stored session token, if any
    pub fn token(&self) -> Option<String> {
        self.get(CredentialField::Token).filter(|t| !t.is_empty())
    }

    /// Stored anti-forgery token, empty by default
    pub fn anti_forgery_token(&self) -> String {
        self.get(CredentialField::CorsToken).unwrap_or_default()
    }

    /// Write one slot
    pub fn save(&self, field: CredentialField, value: &str) {
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.set(field.key(), value) {
                warn!("Failed to persist {}: {}", field.key(), e);
            } else {
                debug!("Persisted {}", field.key());
            }
        }
    }

    /// Write all four slots for a new session in one storage operation
    pub fn save_session(&self, principal: &Principal, token: &str, anti_forgery_token: &str) {
        let Some(backend) = &self.backend else {
            return;
        };
        let identity = match serde_json::to_string(principal.identity()) {
            Ok(identity) => identity,
            Err(e) => {
                warn!("Failed to serialize identity: {}", e);
                return;
            }
        };
        let entries = [
            (CredentialField::CurrentUser.key(), identity.as_str()),
            (CredentialField::UserRole.key(), principal.role().as_str()),
            (CredentialField::Token.key(), token),
            (CredentialField::CorsToken.key(), anti_forgery_token),
        ];
        if let Err(e) = backend.set_many(&entries) {
            warn!("Failed to persist session: {}", e);
        }
    }

    /// Remove one slot
    pub fn remove(&self, field: CredentialField) {
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.remove(field.key()) {
                warn!("Failed to remove {}: {}", field.key(), e);
            }
        }
    }

    /// Remove all four slots
    pub fn clear(&self) {
        if let Some(backend) = &self.backend {
            let keys = CredentialField::ALL.map(|f| f.key());
            if let Err(e) = backend.remove_many(&keys) {
                warn!("Failed to clear stored session: {}", e);
            }
        }
    }
}
