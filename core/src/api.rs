/// CoHub REST backend client — consumed, not defined by this crate
///
/// Endpoints:
///   POST /api/friends/list        body: {"userId":"..."}
///   POST /api/chat/list           body: {"userId":"..."}
///   POST /api/chat/open           body: {"userId":"...","otherUserId":"..."}
///   POST /api/chat/send           body: {"chatId":"...","senderId":"...","content":"..."}
///   POST /api/chat/sendImageBase64  body: {"chatId":"...","senderId":"...","imageBase64":"..."}
///   POST /api/group/list          body: {"userId":"..."}
///   POST /api/group/sendMessage   body: {"groupId":"...","senderId":"...","content"|"imageUrl":"..."}
///
/// Every response is a JSON envelope carrying a `success` flag. Sender and
/// member fields may arrive as plain id strings or populated objects; both
/// are normalized to the id string here.
use crate::error::{ClientError, Result};
use crate::types::{parse_ts, Message};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub struct BackendApi {
    http: reqwest::Client,
    base_url: String,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

/// A user reference, either a bare id or a populated object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Plain(String),
    Populated {
        #[serde(rename = "_id")]
        id: String,
    },
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Plain(id) => id,
            UserRef::Populated { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub sender: UserRef,
    #[serde(default)]
    pub content: String,
    pub timestamp: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub participants: Vec<UserRef>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<UserRef>,
    #[serde(default)]
    pub admins: Vec<UserRef>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(rename = "adminMode", default)]
    pub admin_mode: bool,
    #[serde(rename = "profileImage")]
    pub profile_image: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct FriendsListResponse {
    success: bool,
    #[serde(default)]
    contacts: Vec<Contact>,
}

#[derive(Debug, Deserialize)]
struct ChatListResponse {
    success: bool,
    #[serde(default)]
    chats: Vec<ChatRecord>,
}

#[derive(Debug, Deserialize)]
struct ChatOpenResponse {
    success: bool,
    chat: Option<ChatRecord>,
}

#[derive(Debug, Deserialize)]
struct GroupListResponse {
    success: bool,
    #[serde(default)]
    groups: Vec<GroupRecord>,
}

/// Normalize wire messages into transcript messages. Messages without a
/// parseable timestamp fall back to the conversation's `updatedAt`, then to
/// the epoch.
pub fn resolve_messages(wire: &[WireMessage], updated_at: Option<&str>) -> Vec<Message> {
    let fallback = updated_at
        .and_then(parse_ts)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    wire.iter()
        .map(|m| {
            let ts = m
                .timestamp
                .as_deref()
                .and_then(parse_ts)
                .unwrap_or(fallback);
            Message::confirmed(m.sender.id(), m.content.clone(), ts, m.image_url.clone())
        })
        .collect()
}

// ─── Client ──────────────────────────────────────────────────────────────────

impl BackendApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.post(&url).json(&body).send().await?;
        Ok(resp.json::<T>().await?)
    }

    pub async fn list_friends(&self, user_id: &str) -> Result<Vec<Contact>> {
        let r: FriendsListResponse = self
            .post("/api/friends/list", json!({ "userId": user_id }))
            .await?;
        if !r.success {
            return Err(ClientError::Backend("friends/list rejected".to_string()));
        }
        Ok(r.contacts)
    }

    pub async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatRecord>> {
        let r: ChatListResponse = self
            .post("/api/chat/list", json!({ "userId": user_id }))
            .await?;
        if !r.success {
            return Err(ClientError::Backend("chat/list rejected".to_string()));
        }
        Ok(r.chats)
    }

    pub async fn open_chat(&self, user_id: &str, other_user_id: &str) -> Result<ChatRecord> {
        let r: ChatOpenResponse = self
            .post(
                "/api/chat/open",
                json!({ "userId": user_id, "otherUserId": other_user_id }),
            )
            .await?;
        match r.chat {
            Some(chat) if r.success => Ok(chat),
            _ => Err(ClientError::Backend(format!(
                "chat/open rejected for {}",
                other_user_id
            ))),
        }
    }

    pub async fn send_chat_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<()> {
        let r: Envelope = self
            .post(
                "/api/chat/send",
                json!({ "chatId": chat_id, "senderId": sender_id, "content": content }),
            )
            .await?;
        if !r.success {
            return Err(ClientError::Backend("chat/send rejected".to_string()));
        }
        Ok(())
    }

    pub async fn send_chat_image(
        &self,
        chat_id: &str,
        sender_id: &str,
        image_base64: &str,
    ) -> Result<()> {
        let r: Envelope = self
            .post(
                "/api/chat/sendImageBase64",
                json!({ "chatId": chat_id, "senderId": sender_id, "imageBase64": image_base64 }),
            )
            .await?;
        if !r.success {
            return Err(ClientError::Backend(
                "chat/sendImageBase64 rejected".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn list_groups(&self, user_id: &str) -> Result<Vec<GroupRecord>> {
        let r: GroupListResponse = self
            .post("/api/group/list", json!({ "userId": user_id }))
            .await?;
        if !r.success {
            return Err(ClientError::Backend("group/list rejected".to_string()));
        }
        Ok(r.groups)
    }

    pub async fn send_group_message(
        &self,
        group_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<()> {
        let r: Envelope = self
            .post(
                "/api/group/sendMessage",
                json!({ "groupId": group_id, "senderId": sender_id, "content": content }),
            )
            .await?;
        if !r.success {
            return Err(ClientError::Backend(
                "group/sendMessage rejected".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn send_group_image(
        &self,
        group_id: &str,
        sender_id: &str,
        image_url: &str,
    ) -> Result<()> {
        let r: Envelope = self
            .post(
                "/api/group/sendMessage",
                json!({ "groupId": group_id, "senderId": sender_id, "imageUrl": image_url }),
            )
            .await?;
        if !r.success {
            return Err(ClientError::Backend(
                "group/sendMessage rejected".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryStatus;

    #[test]
    fn test_user_ref_normalization() {
        let plain: UserRef = serde_json::from_str(r#""u1""#).unwrap();
        assert_eq!(plain.id(), "u1");

        let populated: UserRef = serde_json::from_str(r#"{"_id":"u2","username":"sam"}"#).unwrap();
        assert_eq!(populated.id(), "u2");
    }

    #[test]
    fn test_resolve_messages_timestamps() {
        let wire: Vec<WireMessage> = serde_json::from_str(
            r#"[
                {"sender":"u1","content":"hi","timestamp":"2024-05-01T12:00:00.000Z"},
                {"sender":{"_id":"u2"},"content":"[Image]","imageUrl":"data:image/png;base64,xyz"}
            ]"#,
        )
        .unwrap();

        let msgs = resolve_messages(&wire, Some("2024-05-01T13:00:00.000Z"));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].sender, "u1");
        assert_eq!(msgs[0].delivery, DeliveryStatus::Confirmed);
        assert_eq!(msgs[1].sender, "u2");
        // Missing timestamp falls back to the conversation's updatedAt
        assert_eq!(
            msgs[1].timestamp,
            parse_ts("2024-05-01T13:00:00.000Z").unwrap()
        );
        assert_eq!(
            msgs[1].image_url.as_deref(),
            Some("data:image/png;base64,xyz")
        );
    }

    #[test]
    fn test_chat_record_decoding() {
        let chat: ChatRecord = serde_json::from_str(
            r#"{"_id":"c1","participants":["u1",{"_id":"u2"}],"messages":[],"updatedAt":"2024-05-01T12:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(chat.id, "c1");
        assert_eq!(chat.participants.len(), 2);
        assert_eq!(chat.participants[1].id(), "u2");
        assert!(chat.messages.is_empty());
    }
}
