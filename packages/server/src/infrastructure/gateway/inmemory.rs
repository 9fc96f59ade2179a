//! InMemory Message Gateway 実装
//!
//! ドメイン層が定義する MessageGateway trait の具体的な実装。
//! ユーザー・Room・メッセージをプロセス内に保持します。

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use dashmap::DashMap;
use lounge_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{
    GatewayError, MessageContent, MessageGateway, MessageRecord, RoomId, Timestamp, UserId,
    Username,
};

use super::directory::{Directory, DirectoryError};

pub struct InMemoryMessageGateway {
    users: DashMap<UserId, Username>,
    rooms: DashMap<RoomId, String>,
    messages: Mutex<Vec<MessageRecord>>,
    next_message_id: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageGateway {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: DashMap::new(),
            rooms: DashMap::new(),
            messages: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1),
            clock,
        }
    }

    pub fn from_directory(directory: &Directory, clock: Arc<dyn Clock>) -> Result<Self, DirectoryError> {
        let gateway = Self::new(clock);
        for (user_id, username) in directory.users()? {
            gateway.add_user(user_id, username);
        }
        for (room_id, name) in directory.rooms()? {
            gateway.add_room(room_id, name);
        }
        Ok(gateway)
    }

    pub fn add_user(&self, user_id: UserId, username: Username) {
        self.users.insert(user_id, username);
    }

    pub fn add_room(&self, room_id: RoomId, name: String) {
        self.rooms.insert(room_id, name);
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Messages persisted for `room_id`, oldest first
    pub async fn messages_in(&self, room_id: &RoomId) -> Vec<MessageRecord> {
        let messages = self.messages.lock().await;
        messages
            .iter()
            .filter(|record| &record.room_id == room_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageGateway for InMemoryMessageGateway {
    async fn persist_message(
        &self,
        user_id: UserId,
        room_id: &RoomId,
        content: &MessageContent,
    ) -> Result<MessageRecord, GatewayError> {
        if !self.users.contains_key(&user_id) {
            return Err(GatewayError::NotFound(format!("user {}", user_id)));
        }
        if !self.rooms.contains_key(room_id) {
            return Err(GatewayError::NotFound(format!("room {}", room_id)));
        }

        let record = MessageRecord {
            id: self.next_message_id.fetch_add(1, Ordering::Relaxed),
            room_id: room_id.clone(),
            user_id,
            content: content.clone(),
            created_at: Timestamp::new(self.clock.now_millis()),
        };

        let mut messages = self.messages.lock().await;
        messages.push(record.clone());
        Ok(record)
    }

    async fn resolve_username(&self, user_id: UserId) -> Result<Username, GatewayError> {
        self.users
            .get(&user_id)
            .map(|username| username.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("user {}", user_id)))
    }
}
