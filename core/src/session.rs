//! Persisted session storage.
//!
//! The client only needs a small key-value capability: read the bearer
//! token and tenant slug, and wipe the session when the backend answers 401.
//! `SessionStore` is that capability; the app decides where it lives.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

pub const AUTH_TOKEN: &str = "auth_token";
pub const USER_DATA: &str = "user_data";
pub const TENANT_SLUG: &str = "tenant_slug";
pub const TENANT_ID: &str = "tenant_id";

/// Keys removed when the backend rejects the session.
pub const SESSION_KEYS: &[&str] = &[AUTH_TOKEN, USER_DATA, TENANT_SLUG, TENANT_ID];

pub trait SessionStore: Send + Sync {
    /// Values for `keys`, positionally; `None` for missing keys.
    fn get(&self, keys: &[&str]) -> Result<Vec<Option<String>>>;

    fn set(&self, pairs: &[(&str, &str)]) -> Result<()>;

    fn remove(&self, keys: &[&str]) -> Result<()>;

    fn get_one(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(&[key])?.pop().flatten())
    }
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn get(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        (**self).get(keys)
    }

    fn set(&self, pairs: &[(&str, &str)]) -> Result<()> {
        (**self).set(pairs)
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        (**self).remove(keys)
    }
}

fn poisoned<T>(_: T) -> ApiError {
    ApiError::Session("session lock poisoned".to_string())
}

/// In-memory store; contents die with the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(AUTH_TOKEN.to_string(), token.to_string());
        }
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let values = self.values.lock().map_err(poisoned)?;
        Ok(keys.iter().map(|key| values.get(*key).cloned()).collect())
    }

    fn set(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.lock().map_err(poisoned)?;
        for (key, value) in pairs {
            values.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.lock().map_err(poisoned)?;
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// A missing file reads as an empty session. Every write rewrites the file.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(ApiError::Session(format!("{}: {err}", self.path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ApiError::Session(format!(
                "{}: expected a JSON object",
                self.path.display()
            ))),
            Err(err) => Err(ApiError::Session(format!("{}: {err}", self.path.display()))),
        }
    }

    fn save(&self, map: Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| ApiError::Session(format!("{}: {err}", parent.display())))?;
        }
        let raw = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|err| ApiError::Serialization(err.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|err| ApiError::Session(format!("{}: {err}", self.path.display())))
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let map = self.load()?;
        Ok(keys
            .iter()
            .map(|key| match map.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .collect())
    }

    fn set(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut map = self.load()?;
        for (key, value) in pairs {
            map.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        self.save(map)
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut map = self.load()?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.save(map)
    }
}
