//! Message Gateway port
//!
//! メッセージの永続化とユーザー名の解決を担う外部コラボレーターへのインターフェース。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{
    entity::MessageRecord,
    error::GatewayError,
    value_object::{MessageContent, RoomId, UserId, Username},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// メッセージを永続化する
    ///
    /// Fails with `GatewayError::NotFound` if the room or user is unknown and
    /// `GatewayError::Store` on write failure.
    async fn persist_message(
        &self,
        user_id: UserId,
        room_id: &RoomId,
        content: &MessageContent,
    ) -> Result<MessageRecord, GatewayError>;

    /// User ID からユーザー名を解決する
    async fn resolve_username(&self, user_id: UserId) -> Result<Username, GatewayError>;
}
