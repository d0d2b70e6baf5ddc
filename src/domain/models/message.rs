//! Inter-agent message envelope (FIPA-ACL-flavoured).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Speech-act role of a message, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Performative {
    Inform,
    Request,
    Propose,
    Accept,
    Reject,
    Query,
    Subscribe,
}

impl Performative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inform => "inform",
            Self::Request => "request",
            Self::Propose => "propose",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Query => "query",
            Self::Subscribe => "subscribe",
        }
    }
}

/// On-the-wire envelope exchanged between agents through the runtime's
/// router. `protocol` is fixed to "fipa-acl" as specified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub performative: Performative,
    pub content: Value,
    pub protocol: String,
    pub conversation_id: Uuid,
    pub in_reply_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(sender_id: Uuid, receiver_id: Uuid, performative: Performative, content: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            performative,
            content,
            protocol: "fipa-acl".to_string(),
            conversation_id: Uuid::new_v4(),
            in_reply_to: None,
            created_at: Utc::now(),
        }
    }

    pub fn in_conversation(mut self, conversation_id: Uuid) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    /// Build a reply in the same conversation, addressed back to the
    /// original sender.
    pub fn reply(original: &Message, performative: Performative, content: Value) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: original.receiver_id,
            receiver_id: original.sender_id,
            performative,
            content,
            protocol: "fipa-acl".to_string(),
            conversation_id: original.conversation_id,
            in_reply_to: Some(original.id),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_uses_fipa_acl_protocol() {
        let msg = Message::new(Uuid::new_v4(), Uuid::new_v4(), Performative::Inform, serde_json::json!({"ping": 1}));
        assert_eq!(msg.protocol, "fipa-acl");
        assert!(msg.in_reply_to.is_none());
    }
}
