/// Shared types for the messaging client
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A conversation counterpart: either a direct-chat user or a group.
/// Every per-conversation map in this crate is keyed by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartnerId {
    Direct(String),
    Group(String),
}

impl PartnerId {
    /// The underlying user or group id
    pub fn raw(&self) -> &str {
        match self {
            PartnerId::Direct(id) | PartnerId::Group(id) => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, PartnerId::Group(_))
    }
}

impl fmt::Display for PartnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartnerId::Direct(id) => write!(f, "dm:{}", id),
            PartnerId::Group(id) => write!(f, "group:{}", id),
        }
    }
}

/// Delivery state of a transcript entry. Server-confirmed messages are
/// always `Confirmed`; locally composed ones start `Pending` and move to
/// `Confirmed` or `Failed` once the send request resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Confirmed,
    Failed,
}

/// One message in a conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Client-local id, used to find the entry again when its send resolves.
    /// Never sent to the backend.
    pub local_id: Uuid,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub image_url: Option<String>,
    pub delivery: DeliveryStatus,
}

impl Message {
    /// A message as returned by the backend
    pub fn confirmed(
        sender: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        image_url: Option<String>,
    ) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            sender: sender.into(),
            content: content.into(),
            timestamp,
            image_url,
            delivery: DeliveryStatus::Confirmed,
        }
    }

    /// An optimistic message composed by the viewer, stamped with the
    /// current wall-clock time
    pub fn local(viewer_id: &str, content: impl Into<String>, image_url: Option<String>) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            sender: viewer_id.to_string(),
            content: content.into(),
            timestamp: Utc::now(),
            image_url,
            delivery: DeliveryStatus::Pending,
        }
    }
}

/// Parse an RFC3339 timestamp, as the backend emits them
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
