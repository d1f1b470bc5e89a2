/// The open conversation's transcript: server-confirmed history plus
/// optimistic local entries, reconciled against each poll by message count.
use crate::types::{DeliveryStatus, Message, PartnerId};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Transcript {
    pub partner: PartnerId,
    /// Backend chat id for direct conversations, group id for groups
    pub conversation_id: String,
    /// Sends are refused locally when the group is admin-only and the
    /// viewer is not an admin
    pub admin_locked: bool,
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(partner: PartnerId, conversation_id: String, messages: Vec<Message>) -> Self {
        Self {
            partner,
            conversation_id,
            admin_locked: false,
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append an optimistic local entry. Takes effect immediately, before
    /// any network response.
    pub fn append_local(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Update the delivery state of a local entry. Returns false if the
    /// entry has already been superseded by a server transcript.
    pub fn mark_delivery(&mut self, local_id: Uuid, status: DeliveryStatus) -> bool {
        for m in self.messages.iter_mut().rev() {
            if m.local_id == local_id {
                m.delivery = status;
                return true;
            }
        }
        false
    }

    /// Reconcile against a freshly fetched server transcript. The server
    /// version replaces the local one wholesale when the message counts
    /// differ; failed local entries are excluded from the count and
    /// re-appended afterwards so they stay visible. Returns whether a
    /// replacement happened.
    pub fn reconcile(&mut self, server: Vec<Message>) -> bool {
        let rendered = self
            .messages
            .iter()
            .filter(|m| m.delivery != DeliveryStatus::Failed)
            .count();
        if server.len() == rendered {
            return false;
        }

        let failed: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.delivery == DeliveryStatus::Failed)
            .cloned()
            .collect();
        self.messages = server;
        self.messages.extend(failed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn direct() -> Transcript {
        Transcript::new(PartnerId::Direct("u2".into()), "c1".into(), Vec::new())
    }

    fn confirmed(sender: &str, content: &str) -> Message {
        Message::confirmed(sender, content, Utc::now(), None)
    }

    #[test]
    fn test_optimistic_append_is_synchronous() {
        let mut t = direct();
        assert!(t.is_empty());
        t.append_local(Message::local("viewer", "hi", None));
        assert_eq!(t.len(), 1);
        assert_eq!(t.messages()[0].sender, "viewer");
        assert_eq!(t.messages()[0].content, "hi");
        assert_eq!(t.messages()[0].delivery, DeliveryStatus::Pending);
    }

    #[test]
    fn test_reconcile_replaces_on_length_change() {
        let mut t = direct();
        t.append_local(Message::local("viewer", "hi", None));

        let server = vec![confirmed("viewer", "hi"), confirmed("u2", "hello back")];
        assert!(t.reconcile(server));
        assert_eq!(t.len(), 2);
        assert!(t.messages().iter().all(|m| m.delivery == DeliveryStatus::Confirmed));
    }

    #[test]
    fn test_reconcile_noop_on_equal_length() {
        let mut t = direct();
        t.append_local(Message::local("viewer", "hi", None));
        let local_id = t.messages()[0].local_id;

        // Server already reflects the optimistic entry: same count, no swap
        assert!(!t.reconcile(vec![confirmed("viewer", "hi")]));
        assert_eq!(t.messages()[0].local_id, local_id);
    }

    #[test]
    fn test_mark_delivery() {
        let mut t = direct();
        let msg = Message::local("viewer", "hi", None);
        let id = msg.local_id;
        t.append_local(msg);

        assert!(t.mark_delivery(id, DeliveryStatus::Confirmed));
        assert_eq!(t.messages()[0].delivery, DeliveryStatus::Confirmed);
        assert!(!t.mark_delivery(Uuid::new_v4(), DeliveryStatus::Failed));
    }

    #[test]
    fn test_failed_entries_survive_reconcile() {
        let mut t = direct();
        let msg = Message::local("viewer", "lost", None);
        let id = msg.local_id;
        t.append_local(msg);
        t.mark_delivery(id, DeliveryStatus::Failed);

        // Other party's message arrives; the failed entry is not part of
        // the rendered count and rides along after the replacement.
        assert!(t.reconcile(vec![confirmed("u2", "hello?")]));
        assert_eq!(t.len(), 2);
        assert_eq!(t.messages()[1].content, "lost");
        assert_eq!(t.messages()[1].delivery, DeliveryStatus::Failed);

        // A repeat poll with the same server state is then a no-op
        assert!(!t.reconcile(vec![confirmed("u2", "hello?")]));
    }
}
