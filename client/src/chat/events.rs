use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::UserIdentity;

/// Reserved sender id for informational messages from the service.
pub const SYSTEM_SENDER: &str = "system";

/// A single chat message as it travels over the realtime channel and sits in
/// the local message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

impl ChatMessage {
    /// Stamp a new outbound message with the sender's identity and the
    /// current time.
    pub fn outgoing(text: &str, room_id: &str, sender: &UserIdentity) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            user_id: sender.id.clone(),
            timestamp: Utc::now(),
            room_id: room_id.to_string(),
            sender_avatar: sender.avatar_ref.clone(),
            sender_name: sender.character_name.clone(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id == SYSTEM_SENDER
    }
}

/// Outbound intents emitted to the realtime service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String, user_id: String },
    SendMessage {
        #[serde(flatten)]
        message: ChatMessage,
    },
    #[serde(rename_all = "camelCase")]
    GetChatHistory { room_id: String },
}

/// Inbound events received from the realtime service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage {
        #[serde(flatten)]
        message: ChatMessage,
    },
    ChatHistory { messages: Vec<ChatMessage> },
    #[serde(rename_all = "camelCase")]
    RoomExpired { room_id: String },
    OnlineUsers { count: usize },
}
