/// Local key-value storage behind an injected port trait, so the read-marker
/// store can run against an in-memory map in tests and sled in production.
use crate::error::{ClientError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub trait StoragePort: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Persistent storage backed by sled
pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join("client.db");
        debug!("Opening client store at {:?}", db_path);
        let db = sled::open(&db_path)
            .map_err(|e| ClientError::Storage(format!("Failed to open client store: {}", e)))?;
        Ok(Self { db })
    }
}

impl StoragePort for SledStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(value)) => String::from_utf8(value.to_vec())
                .map(Some)
                .map_err(|e| ClientError::Storage(format!("Non-UTF8 value for {}: {}", key, e))),
            Ok(None) => Ok(None),
            Err(e) => Err(ClientError::Storage(format!("get {}: {}", key, e))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| ClientError::Storage(format!("set {}: {}", key, e)))?;
        self.db
            .flush()
            .map_err(|e| ClientError::Storage(format!("flush: {}", e)))?;
        Ok(())
    }
}

/// In-memory storage for tests
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoragePort for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::Storage("memory store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ClientError::Storage("memory store poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sled_storage_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledStorage::new(temp_dir.path()).unwrap();

        assert_eq!(store.get("missing").unwrap(), None);

        store.set("chatLastRead:u1", r#"{"u2":"2024-05-01T12:00:00Z"}"#).unwrap();
        assert_eq!(
            store.get("chatLastRead:u1").unwrap().as_deref(),
            Some(r#"{"u2":"2024-05-01T12:00:00Z"}"#)
        );

        // Overwrite
        store.set("chatLastRead:u1", "{}").unwrap();
        assert_eq!(store.get("chatLastRead:u1").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_memory_storage_basic() {
        let store = MemoryStorage::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
