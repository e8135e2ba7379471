use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One chat message between two identities. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Assigned by the store; absent on a client's optimistic copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    #[serde(with = "crate::timestamp")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        content: impl Into<String>,
        timestamp: OffsetDateTime,
    ) -> Self {
        Self {
            id: None,
            sender: sender.into(),
            receiver: receiver.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// True if this message travels between `a` and `b`, in either direction.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender == a && self.receiver == b) || (self.sender == b && self.receiver == a)
    }

    /// The other party of the message as seen from `local`, if `local` took part.
    pub fn counterpart_of(&self, local: &str) -> Option<&str> {
        if self.sender == local {
            Some(&self.receiver)
        } else if self.receiver == local {
            Some(&self.sender)
        } else {
            None
        }
    }
}

/// A counterpart the caller has exchanged messages with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub counterpart: String,
    #[serde(with = "crate::timestamp")]
    pub last_message_at: OffsetDateTime,
}
