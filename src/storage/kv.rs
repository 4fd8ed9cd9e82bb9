use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::foundation::error::{ConvoyError, ConvoyResult};

/// Session-scoped key/value store.
///
/// Values are opaque strings (JSON in practice). Implementations may fail on any call; callers in
/// this crate treat persistence as best-effort.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> ConvoyResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ConvoyResult<()>;
    fn remove(&self, key: &str) -> ConvoyResult<()>;
}

/// In-memory store with an optional per-value quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, String>>,
    max_value_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes whose value exceeds `max_value_bytes`, like a full browser storage quota.
    pub fn with_quota(max_value_bytes: usize) -> Self {
        Self {
            map: Mutex::default(),
            max_value_bytes: Some(max_value_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> ConvoyResult<Option<String>> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ConvoyResult<()> {
        if let Some(max) = self.max_value_bytes
            && value.len() > max
        {
            return Err(ConvoyError::telemetry(format!(
                "quota exceeded writing '{key}' ({} > {max} bytes)",
                value.len()
            )));
        }
        self.map.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ConvoyResult<()> {
        self.map.lock().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file. Used by the CLI to keep state between runs.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> ConvoyResult<BTreeMap<String, String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(ConvoyError::telemetry(format!(
                    "read store '{}': {e}",
                    self.path.display()
                )));
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            ConvoyError::serde(format!("parse store '{}': {e}", self.path.display()))
        })
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> ConvoyResult<()> {
        let text = serde_json::to_string_pretty(map)
            .map_err(|e| ConvoyError::serde(format!("encode store: {e}")))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConvoyError::telemetry(format!("create dir '{}': {e}", parent.display()))
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                ConvoyError::telemetry(format!("write store '{}': {e}", self.path.display()))
            })
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, key: &str) -> ConvoyResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> ConvoyResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_all()?;
        map.insert(key.to_string(), value.to_string());
        self.write_all(&map)
    }

    fn remove(&self, key: &str) -> ConvoyResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_all()?;
        if map.remove(key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/kv.rs"]
mod tests;
