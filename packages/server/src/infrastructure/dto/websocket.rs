//! WebSocket wire protocol.
//!
//! One JSON object per text frame, no batching:
//!
//! - inbound chat: `{"message": string, "user_id": integer}`
//! - outbound chat: `{"message": string, "user_id": integer, "username": string}`
//! - outbound presence: `{"type": "online_users_count", "count": integer}`

use serde::{Deserialize, Serialize};

use crate::domain::{ProtocolError, RoomEvent};

/// Frame sent by a client to post a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundChatFrame {
    pub message: String,
    pub user_id: i64,
}

impl InboundChatFrame {
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Chat message delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub message: String,
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    OnlineUsersCount,
}

/// Presence count delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineUsersCountFrame {
    pub r#type: FrameType,
    pub count: u64,
}

/// Any frame the server sends. Presence frames carry a `type` field, chat
/// frames do not, so the untagged form tries presence first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    OnlineUsersCount(OnlineUsersCountFrame),
    Chat(ChatFrame),
}

impl OutboundFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Encode a room event as the frame a client receives.
pub fn encode_event(event: &RoomEvent) -> Result<String, serde_json::Error> {
    OutboundFrame::from(event.clone()).encode()
}
