/// Conversation summary cache — a snapshot of every conversation's most
/// recent message, rebuilt wholesale from the backend's chat and group
/// listings on each refresh. Never mutated in place.
use crate::api::{ChatRecord, GroupRecord};
use crate::types::{parse_ts, PartnerId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Summary of one conversation thread (for list views and unread dots)
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    /// Backend chat id for direct conversations, group id for groups
    pub conversation_id: String,
    /// Sender of the last message, if any message exists
    pub last_sender: Option<String>,
    /// Timestamp of the last message; falls back to the conversation's
    /// `updatedAt` when the last message carries no parseable timestamp
    pub last_timestamp: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryCache {
    entries: HashMap<PartnerId, SummaryEntry>,
}

impl SummaryCache {
    /// Build a fresh cache from the backend listings. The last message is
    /// the final element of each server-ordered message array; no client
    /// side sort is performed.
    pub fn rebuild(viewer_id: &str, chats: &[ChatRecord], groups: &[GroupRecord]) -> Self {
        let mut entries = HashMap::new();

        for chat in chats {
            let Some(other) = chat
                .participants
                .iter()
                .map(|p| p.id())
                .find(|id| *id != viewer_id)
            else {
                continue;
            };
            let updated_at = chat.updated_at.as_deref().and_then(parse_ts);
            let last = chat.messages.last();
            entries.insert(
                PartnerId::Direct(other.to_string()),
                SummaryEntry {
                    conversation_id: chat.id.clone(),
                    last_sender: last.map(|m| m.sender.id().to_string()),
                    last_timestamp: last
                        .and_then(|m| m.timestamp.as_deref().and_then(parse_ts))
                        .or(updated_at),
                    updated_at,
                },
            );
        }

        for group in groups {
            let updated_at = group.updated_at.as_deref().and_then(parse_ts);
            let last = group.messages.last();
            entries.insert(
                PartnerId::Group(group.id.clone()),
                SummaryEntry {
                    conversation_id: group.id.clone(),
                    last_sender: last.map(|m| m.sender.id().to_string()),
                    last_timestamp: last
                        .and_then(|m| m.timestamp.as_deref().and_then(parse_ts))
                        .or(updated_at),
                    updated_at,
                },
            );
        }

        Self { entries }
    }

    pub fn get(&self, partner: &PartnerId) -> Option<&SummaryEntry> {
        self.entries.get(partner)
    }

    pub fn partners(&self) -> impl Iterator<Item = (&PartnerId, &SummaryEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
