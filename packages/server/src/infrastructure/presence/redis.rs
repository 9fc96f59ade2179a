//! Redis Presence Store 実装
//!
//! One sorted set per room, `{prefix}:presence:{room_id}`. Members are
//! `"{user_id}|{node_id}"` and the score is the lease expiry in epoch
//! milliseconds. Every mutation runs as a MULTI/EXEC pipeline, so concurrent
//! processes never observe a half-applied update.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use lounge_shared::time::Clock;
use redis::aio::ConnectionManager;

use crate::domain::{NodeId, PresenceError, PresenceStore, RoomId, UserId};

const MEMBER_SEPARATOR: char = '|';

#[derive(Clone)]
pub struct RedisPresenceStore {
    manager: ConnectionManager,
    node_id: NodeId,
    key_prefix: String,
    ttl_millis: i64,
    clock: Arc<dyn Clock>,
}

impl RedisPresenceStore {
    pub async fn connect(
        redis_url: &str,
        node_id: NodeId,
        key_prefix: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PresenceError> {
        let client = redis::Client::open(redis_url).map_err(store_error)?;
        let manager = ConnectionManager::new(client).await.map_err(store_error)?;

        Ok(Self {
            manager,
            node_id,
            key_prefix: key_prefix.into(),
            ttl_millis: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        })
    }

    fn key(&self, room_id: &RoomId) -> String {
        format!("{}:presence:{}", self.key_prefix, room_id)
    }

    fn member(&self, user_id: UserId) -> String {
        format!("{}{}{}", user_id, MEMBER_SEPARATOR, self.node_id)
    }

    /// Room keys outlive their longest lease so an abandoned room cleans up.
    fn key_ttl_millis(&self) -> i64 {
        self.ttl_millis.saturating_mul(2)
    }
}

fn store_error(error: redis::RedisError) -> PresenceError {
    PresenceError::Store(error.to_string())
}

/// Distinct users among `"{user_id}|{node_id}"` members. Members that do not
/// parse are ignored.
fn distinct_users(members: &[String]) -> u64 {
    let mut users: Vec<i64> = members
        .iter()
        .filter_map(|member| member.split_once(MEMBER_SEPARATOR))
        .filter_map(|(user_id, _)| user_id.parse::<i64>().ok())
        .collect();
    users.sort_unstable();
    users.dedup();
    users.len() as u64
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn add(&self, room_id: &RoomId, user_id: UserId) -> Result<(), PresenceError> {
        self.refresh(room_id, vec![user_id]).await
    }

    async fn remove(&self, room_id: &RoomId, user_id: UserId) -> Result<(), PresenceError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("ZREM")
            .arg(self.key(room_id))
            .arg(self.member(user_id))
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn cardinality(&self, room_id: &RoomId) -> Result<u64, PresenceError> {
        let key = self.key(room_id);
        let now = self.clock.now_millis();
        let mut conn = self.manager.clone();

        let (members,): (Vec<String>,) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg("-inf")
            .arg(now)
            .ignore()
            .cmd("ZRANGE")
            .arg(&key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok(distinct_users(&members))
    }

    async fn refresh(&self, room_id: &RoomId, user_ids: Vec<UserId>) -> Result<(), PresenceError> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let key = self.key(room_id);
        let expires_at = self.clock.now_millis().saturating_add(self.ttl_millis);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for user_id in user_ids {
            pipe.cmd("ZADD")
                .arg(&key)
                .arg(expires_at)
                .arg(self.member(user_id))
                .ignore();
        }
        pipe.cmd("PEXPIRE")
            .arg(&key)
            .arg(self.key_ttl_millis())
            .ignore();

        let mut conn = self.manager.clone();
        let _: () = pipe.query_async(&mut conn).await.map_err(store_error)?;
        Ok(())
    }
}
