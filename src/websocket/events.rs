//! Wire protocol for the realtime socket. Every frame is a JSON object of
//! the form `{"event": "<kebab-case-name>", "data": <payload>}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EnrichedMessage, MessagePayload, ReadReceipt};

/// Frames the server accepts from clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Bind this socket to an account and join the presence roster.
    JoinRoom(String),
    SendMessage(MessagePayload),
    MarkAsRead(MarkAsReadPayload),
    Typing(TypingPayload),
    StopTyping(TypingPayload),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPayload {
    pub message_id: Uuid,
    pub reader_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub sender_id: String,
    pub receiver_id: String,
}

/// Frames the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    OnlineUsers(Vec<Uuid>),
    UserConnected(Uuid),
    UserDisconnected(Uuid),
    /// Acknowledgement to the sending socket.
    MessageSent(EnrichedMessage),
    /// Live delivery to the receiving socket.
    ReceiveMessage(EnrichedMessage),
    MessageRead(ReadReceipt),
    #[serde(rename_all = "camelCase")]
    UserTyping {
        sender_id: Uuid,
        receiver_id: Uuid,
        typing: bool,
    },
    #[serde(rename_all = "camelCase")]
    NewMessageNotification {
        sender_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
    MessageError {
        error: String,
    },
}

impl ServerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::OnlineUsers(_) => "online-users",
            ServerEvent::UserConnected(_) => "user-connected",
            ServerEvent::UserDisconnected(_) => "user-disconnected",
            ServerEvent::MessageSent(_) => "message-sent",
            ServerEvent::ReceiveMessage(_) => "receive-message",
            ServerEvent::MessageRead(_) => "message-read",
            ServerEvent::UserTyping { .. } => "user-typing",
            ServerEvent::NewMessageNotification { .. } => "new-message-notification",
            ServerEvent::MessageError { .. } => "message-error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
