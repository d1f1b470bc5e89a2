/// Local read-marker store — persists, per conversation partner, when the
/// viewer last read that conversation. One JSON blob per (viewer, kind)
/// namespace, re-serialized wholesale on every write. Never synced to the
/// server; a storage failure degrades to a warning, not an error.
use crate::storage::StoragePort;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Direct chats and group chats keep separate marker namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Direct,
    Group,
}

impl MarkerKind {
    fn prefix(&self) -> &'static str {
        match self {
            MarkerKind::Direct => "chatLastRead",
            MarkerKind::Group => "groupLastRead",
        }
    }
}

pub struct ReadMarkerStore {
    storage: Arc<dyn StoragePort>,
    key: String,
    // partner id -> RFC3339 timestamp, mirroring the stored blob
    map: Mutex<HashMap<String, String>>,
}

impl ReadMarkerStore {
    /// Load the marker map for one viewer. Missing or unreadable state
    /// starts empty (everything unread until first open).
    pub fn load(storage: Arc<dyn StoragePort>, kind: MarkerKind, viewer_id: &str) -> Self {
        let key = format!("{}:{}", kind.prefix(), viewer_id);
        let map = match storage.get(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Read-marker load failed for {}: {}", key, e);
                HashMap::new()
            }
        };
        Self {
            storage,
            key,
            map: Mutex::new(map),
        }
    }

    pub fn get(&self, partner_id: &str) -> Option<DateTime<Utc>> {
        let map = self.map.lock().ok()?;
        map.get(partner_id)
            .and_then(|raw| crate::types::parse_ts(raw))
    }

    /// Record that the viewer has read `partner_id` up to `ts`. The whole
    /// map is written back; a failed write keeps the in-memory value for
    /// the rest of the session.
    pub fn set(&self, partner_id: &str, ts: DateTime<Utc>) {
        let Ok(mut map) = self.map.lock() else {
            return;
        };
        map.insert(partner_id.to_string(), ts.to_rfc3339());
        match serde_json::to_string(&*map) {
            Ok(raw) => {
                if let Err(e) = self.storage.set(&self.key, &raw) {
                    warn!("Read-marker write skipped for {}: {}", self.key, e);
                }
            }
            Err(e) => warn!("Read-marker encode failed for {}: {}", self.key, e),
        }
    }
}
