use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ConvId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypingStatus {
    Typing,
    Stopped,
}

/// One incoming chat message, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub conv_id: ConvId,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEvent {
    pub conv_id: ConvId,
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub status: TypingStatus,
}

/// Completion of an earlier `send_message`, delivered back into the event
/// loop as an ordinary event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub conv_id: ConvId,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok(conv_id: ConvId) -> Self {
        Self {
            conv_id,
            error: None,
        }
    }

    pub fn failed(conv_id: ConvId, error: impl Into<String>) -> Self {
        Self {
            conv_id,
            error: Some(error.into()),
        }
    }
}

/// Outgoing send request queued towards the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingSend {
    pub conv_id: ConvId,
    pub text: String,
}

/// Narrow transport interface: everything the network client delivers to
/// the UI comes through this enum, one signal emission per event.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    Connected(RosterSnapshot),
    Reconnected,
    Disconnected,
    Message(MessageEvent),
    Typing(TypingEvent),
    SendResult(SendOutcome),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: UserId,
    pub full_name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub is_self: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub user_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: ConvId,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Connect-time snapshot of the account: every known user and conversation,
/// including any message history the server buffered while we were away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub users: Vec<UserEntry>,
    pub conversations: Vec<ConversationEntry>,
}
