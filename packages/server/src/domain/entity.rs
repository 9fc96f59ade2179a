//! Immutable events and records exchanged between sessions.

use super::value_object::{MessageContent, RoomId, Timestamp, UserId, Username};

/// A chat message as fanned out to every connection of a room.
///
/// `timestamp` is assigned by the server on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: Username,
    pub content: MessageContent,
    pub timestamp: Timestamp,
}

/// Number of distinct users online in a room, as observed at `observed_at`.
///
/// Later counts supersede earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceCountEvent {
    pub room_id: RoomId,
    pub count: u64,
    pub observed_at: Timestamp,
}

/// Everything that travels over the Broadcast Bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    ChatMessage(ChatEvent),
    OnlineUsersCount(PresenceCountEvent),
}

impl RoomEvent {
    pub fn room_id(&self) -> &RoomId {
        match self {
            RoomEvent::ChatMessage(event) => &event.room_id,
            RoomEvent::OnlineUsersCount(event) => &event.room_id,
        }
    }
}

/// A message persisted by the Message Gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: i64,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: MessageContent,
    pub created_at: Timestamp,
}
