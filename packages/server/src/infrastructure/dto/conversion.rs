//! Conversion logic between DTOs and domain entities.

use crate::domain::{
    ChatEvent, MessageContent, PresenceCountEvent, RoomEvent, RoomId, Timestamp, UserId, Username,
    ValueObjectError,
};
use crate::infrastructure::dto::{
    bus::BusEventDto,
    websocket::{ChatFrame, FrameType, OnlineUsersCountFrame, OutboundFrame},
};

// ========================================
// Domain Entity → WebSocket frame
// ========================================

impl From<ChatEvent> for ChatFrame {
    fn from(event: ChatEvent) -> Self {
        Self {
            message: event.content.into_string(),
            user_id: event.user_id.value(),
            username: event.username.into_string(),
        }
    }
}

impl From<PresenceCountEvent> for OnlineUsersCountFrame {
    fn from(event: PresenceCountEvent) -> Self {
        Self {
            r#type: FrameType::OnlineUsersCount,
            count: event.count,
        }
    }
}

impl From<RoomEvent> for OutboundFrame {
    fn from(event: RoomEvent) -> Self {
        match event {
            RoomEvent::ChatMessage(chat) => OutboundFrame::Chat(chat.into()),
            RoomEvent::OnlineUsersCount(count) => OutboundFrame::OnlineUsersCount(count.into()),
        }
    }
}

// ========================================
// Domain Entity ⇔ Bus DTO
// ========================================

impl From<&RoomEvent> for BusEventDto {
    fn from(event: &RoomEvent) -> Self {
        match event {
            RoomEvent::ChatMessage(chat) => BusEventDto::ChatMessage {
                room_id: chat.room_id.as_str().to_string(),
                user_id: chat.user_id.value(),
                username: chat.username.as_str().to_string(),
                message: chat.content.as_str().to_string(),
                timestamp: chat.timestamp.value(),
            },
            RoomEvent::OnlineUsersCount(count) => BusEventDto::OnlineUsersCount {
                room_id: count.room_id.as_str().to_string(),
                count: count.count,
                observed_at: count.observed_at.value(),
            },
        }
    }
}

impl TryFrom<BusEventDto> for RoomEvent {
    type Error = ValueObjectError;

    fn try_from(dto: BusEventDto) -> Result<Self, Self::Error> {
        match dto {
            BusEventDto::ChatMessage {
                room_id,
                user_id,
                username,
                message,
                timestamp,
            } => Ok(RoomEvent::ChatMessage(ChatEvent {
                room_id: RoomId::new(room_id)?,
                user_id: UserId::new(user_id)?,
                username: Username::new(username)?,
                content: MessageContent::new(message)?,
                timestamp: Timestamp::new(timestamp),
            })),
            BusEventDto::OnlineUsersCount {
                room_id,
                count,
                observed_at,
            } => Ok(RoomEvent::OnlineUsersCount(PresenceCountEvent {
                room_id: RoomId::new(room_id)?,
                count,
                observed_at: Timestamp::new(observed_at),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_event() -> ChatEvent {
        ChatEvent {
            room_id: RoomId::new("general".to_string()).unwrap(),
            user_id: UserId::new(1).unwrap(),
            username: Username::new("alice".to_string()).unwrap(),
            content: MessageContent::new("hi".to_string()).unwrap(),
            timestamp: Timestamp::new(1000),
        }
    }

    #[test]
    fn test_chat_event_to_frame_drops_room_and_timestamp() {
        // テスト項目: クライアント向け chat フレームは message/user_id/username のみを持つ
        // given (前提条件):
        let event = RoomEvent::ChatMessage(chat_event());

        // when (操作):
        let json: serde_json::Value =
            serde_json::from_str(&OutboundFrame::from(event).encode().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({"message": "hi", "user_id": 1, "username": "alice"})
        );
    }

    #[test]
    fn test_bus_dto_is_tagged_by_type() {
        // テスト項目: Bus 上のイベントは type タグ付きで表現される
        // given (前提条件):
        let event = RoomEvent::OnlineUsersCount(PresenceCountEvent {
            room_id: RoomId::new("general".to_string()).unwrap(),
            count: 2,
            observed_at: Timestamp::new(5000),
        });

        // when (操作):
        let json: serde_json::Value =
            serde_json::from_str(&BusEventDto::from(&event).encode().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(
            json,
            serde_json::json!({
                "type": "online_users_count",
                "room_id": "general",
                "count": 2,
                "observed_at": 5000
            })
        );
    }

    #[test]
    fn test_bus_dto_to_domain_preserves_chat_event() {
        // テスト項目: Bus DTO からドメインイベントへ変換しても内容が保たれる
        // given (前提条件):
        let event = RoomEvent::ChatMessage(chat_event());
        let raw = BusEventDto::from(&event).encode().unwrap();

        // when (操作):
        let decoded = RoomEvent::try_from(BusEventDto::decode(&raw).unwrap());

        // then (期待する結果):
        assert_eq!(decoded, Ok(event));
    }

    #[test]
    fn test_bus_dto_with_invalid_room_is_rejected() {
        // テスト項目: 不正な room_id を持つ Bus DTO はドメインに変換できない
        // given (前提条件):
        let dto = BusEventDto::OnlineUsersCount {
            room_id: String::new(),
            count: 1,
            observed_at: 0,
        };

        // when (操作):
        let result = RoomEvent::try_from(dto);

        // then (期待する結果):
        assert_eq!(result, Err(ValueObjectError::EmptyRoomId));
    }
}
