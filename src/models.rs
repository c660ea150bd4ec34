//! Conversation and message data as seen by the client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation member snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub display_name: String,
}

/// Most recent message of a conversation, as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub content: String,
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_summary: Option<MessageSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Participants other than `user_id`, for list labels
    pub fn others<'a>(&'a self, user_id: Option<&'a str>) -> impl Iterator<Item = &'a Participant> {
        self.participants
            .iter()
            .filter(move |p| Some(p.id.as_str()) != user_id)
    }

    /// Drop repeated participant ids, keeping the first snapshot
    pub(crate) fn dedup_participants(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.participants.retain(|p| seen.insert(p.id.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    #[serde(other)]
    Other,
}

/// Delivery lifecycle of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Position in the forward order `pending < sent < delivered < read`
    fn rank(self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            (Some(0), None) => true,
            _ => false,
        }
    }

    /// Status after observing `incoming`; never regresses
    pub fn advance(self, incoming: MessageStatus) -> MessageStatus {
        if self.can_advance_to(incoming) {
            incoming
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
}

/// A locally composed message the server has not acknowledged yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub provisional_id: String,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl PendingMessage {
    pub fn to_message(&self) -> Message {
        Message {
            id: self.provisional_id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender_id: self.sender_id.clone().unwrap_or_default(),
            content: self.content.clone(),
            kind: MessageKind::Text,
            status: MessageStatus::Pending,
            timestamp: self.created_at,
        }
    }
}

/// Body of `POST /messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub conversation_id: String,
    pub content: String,
    pub kind: MessageKind,
}
