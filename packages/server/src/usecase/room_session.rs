//! UseCase: Room Session（接続ごとの状態機械）
//!
//! ## 状態遷移
//!
//! ```text
//! Connecting ──connect──▶ Joined ──disconnect──▶ Closed
//!     │                                           ▲
//!     └──────────── auth failure / disconnect ────┘
//! ```
//!
//! `Closed` is terminal. A session dropped while still `Joined` (its task was
//! cancelled) leaves the room in the background.
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - connect / receive / disconnect の状態遷移とエラー分類
//! - 同一ユーザー複数接続でのオンライン人数
//! - 古い人数イベントの破棄
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加、送信、退出
//! - 異常系：トークン無し・不正、壊れたフレーム、未知のユーザー
//! - エッジケース：二重 disconnect、タスクのキャンセル

use std::{fmt, sync::Arc};

use crate::{
    domain::{
        AuthError, ChatEvent, ConnectionHandle, ConnectionId, EventSender, GatewayError,
        MessageContent, PresenceCountEvent, ProtocolError, RoomEvent, RoomId, Timestamp, UserId,
    },
    infrastructure::dto::websocket::InboundChatFrame,
};

use super::{context::SessionContext, error::SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Joined,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Joined => "joined",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one client connection in one room.
pub struct RoomSession {
    context: Arc<SessionContext>,
    room_id: RoomId,
    connection_id: ConnectionId,
    state: SessionState,
    user_id: Option<UserId>,
    last_count_at: Option<Timestamp>,
}

impl RoomSession {
    pub fn new(context: Arc<SessionContext>, room_id: RoomId) -> Self {
        let connection_id = context.registry.next_connection_id();
        Self {
            context,
            room_id,
            connection_id,
            state: SessionState::Connecting,
            user_id: None,
            last_count_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Authenticated user, once joined.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Authenticate and join the room.
    ///
    /// On success the connection is registered, presence is claimed, the
    /// room's bus topic is relayed to this process and the new count is
    /// broadcast. Authentication failure closes the session without touching
    /// the registry or the store.
    pub async fn connect(
        &mut self,
        token: Option<&str>,
        sender: EventSender,
    ) -> Result<UserId, SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState { state: self.state });
        }

        let user_id = match self.authenticate(token).await {
            Ok(user_id) => user_id,
            Err(e) => {
                self.state = SessionState::Closed;
                tracing::warn!(room_id = %self.room_id, connection_id = %self.connection_id, "authentication failed: {}", e);
                return Err(e.into());
            }
        };

        self.user_id = Some(user_id);
        self.state = SessionState::Joined;
        self.context
            .presence
            .join(
                &self.room_id,
                ConnectionHandle {
                    id: self.connection_id,
                    user_id,
                    sender,
                },
            )
            .await;

        if let Err(e) = self.context.relay.ensure_subscribed(&self.room_id).await {
            tracing::warn!(room_id = %self.room_id, "room relay unavailable, delivering locally: {}", e);
        }

        tracing::info!(
            room_id = %self.room_id,
            user_id = %user_id,
            connection_id = %self.connection_id,
            "user joined room"
        );
        self.context.presence.broadcast_count(&self.room_id).await;

        Ok(user_id)
    }

    /// Handle one inbound frame and publish the resulting chat event.
    ///
    /// The frame's `user_id` names the author; it is resolved through the
    /// Message Gateway like any other id.
    pub async fn receive(&mut self, raw: &str) -> Result<ChatEvent, SessionError> {
        if self.state != SessionState::Joined {
            return Err(SessionError::InvalidState { state: self.state });
        }

        let frame = InboundChatFrame::decode(raw)?;
        let content = MessageContent::new(frame.message).map_err(ProtocolError::InvalidContent)?;
        let user_id = UserId::new(frame.user_id)
            .map_err(|_| GatewayError::NotFound(format!("user {}", frame.user_id)))?;
        let timestamp = Timestamp::new(self.context.clock.now_millis());

        let username = self.context.gateway.resolve_username(user_id).await?;
        let record = self
            .context
            .gateway
            .persist_message(user_id, &self.room_id, &content)
            .await?;
        tracing::debug!(room_id = %self.room_id, user_id = %user_id, message_id = record.id, "message persisted");

        let event = ChatEvent {
            room_id: self.room_id.clone(),
            user_id,
            username,
            content,
            timestamp,
        };
        self.context
            .broadcaster
            .broadcast(RoomEvent::ChatMessage(event.clone()))
            .await;

        Ok(event)
    }

    /// Leave the room. Valid in any state and idempotent.
    pub async fn disconnect(&mut self, reason_code: u16) {
        match (self.state, self.user_id) {
            (SessionState::Joined, Some(user_id)) => {
                tracing::info!(
                    room_id = %self.room_id,
                    user_id = %user_id,
                    connection_id = %self.connection_id,
                    reason_code,
                    "user leaving room"
                );
                leave_room(&self.context, &self.room_id, self.connection_id, user_id).await;
            }
            (SessionState::Closed, _) => return,
            _ => {}
        }
        self.state = SessionState::Closed;
    }

    /// Route an event from the connection's channel to the matching handler.
    pub fn on_event(&mut self, event: RoomEvent) -> Option<RoomEvent> {
        match event {
            RoomEvent::ChatMessage(chat) => self.on_chat_event(chat).map(RoomEvent::ChatMessage),
            RoomEvent::OnlineUsersCount(count) => self
                .on_presence_count(count)
                .map(RoomEvent::OnlineUsersCount),
        }
    }

    /// Chat event to forward to the client, unchanged.
    pub fn on_chat_event(&self, event: ChatEvent) -> Option<ChatEvent> {
        if self.state != SessionState::Joined || event.room_id != self.room_id {
            return None;
        }
        Some(event)
    }

    /// Count to forward to the client. Counts observed before the last
    /// forwarded one are dropped.
    pub fn on_presence_count(&mut self, event: PresenceCountEvent) -> Option<PresenceCountEvent> {
        if self.state != SessionState::Joined || event.room_id != self.room_id {
            return None;
        }
        if self
            .last_count_at
            .is_some_and(|last| event.observed_at < last)
        {
            tracing::debug!(
                room_id = %self.room_id,
                connection_id = %self.connection_id,
                count = event.count,
                "stale online users count dropped"
            );
            return None;
        }
        self.last_count_at = Some(event.observed_at);
        Some(event)
    }

    async fn authenticate(&self, token: Option<&str>) -> Result<UserId, AuthError> {
        match token.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => self.context.authenticator.authenticate(token).await,
            None => Err(AuthError::MissingToken),
        }
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        let (SessionState::Joined, Some(user_id)) = (self.state, self.user_id) else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let context = Arc::clone(&self.context);
                let room_id = self.room_id.clone();
                let connection_id = self.connection_id;
                runtime.spawn(async move {
                    leave_room(&context, &room_id, connection_id, user_id).await;
                });
            }
            Err(_) => {
                self.context.registry.remove(&self.room_id, self.connection_id);
            }
        }
    }
}

async fn leave_room(
    context: &SessionContext,
    room_id: &RoomId,
    connection_id: ConnectionId,
    user_id: UserId,
) {
    if context.presence.leave(room_id, connection_id, user_id).await {
        context.relay.release_if_idle(room_id).await;
        context.presence.broadcast_count(room_id).await;
    }
}
